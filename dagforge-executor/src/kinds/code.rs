//! ABOUTME: Code node executor — runs a Lua script in a memory- and time-bounded sandbox
//! ABOUTME: Lua is the only language supported initially; `imports` whitelists exposed globals

use std::time::Duration;

use dagforge_core::node::{NodeConfig, NodeKind};
use mlua::{Lua, Value as LuaValue};
use serde_json::Value;

use crate::dispatch::{ExecutorOutput, NodeExecutor};
use crate::error::{ExecutorError, Result};

/// Memory ceiling for the sandbox's Lua heap. Not configurable per-node
/// in this first cut; revisit if a blueprint needs more than this.
const SANDBOX_MEMORY_LIMIT_BYTES: usize = 16 * 1024 * 1024;
const SANDBOX_TIMEOUT: Duration = Duration::from_secs(5);

pub struct CodeExecutor;

#[async_trait::async_trait]
impl NodeExecutor for CodeExecutor {
    async fn invoke(&self, node: &NodeConfig, inputs: Value) -> Result<ExecutorOutput> {
        let NodeKind::Code { language, imports, source } = &node.kind else {
            return Err(ExecutorError::Runtime(format!("{} is not a code node", node.id)));
        };
        if language != "lua" {
            return Err(ExecutorError::Validation(format!(
                "code node '{}' requests unsupported language '{language}'; only 'lua' is supported",
                node.id
            )));
        }

        let source = source.clone();
        let imports = imports.clone();

        let result = tokio::time::timeout(
            SANDBOX_TIMEOUT,
            tokio::task::spawn_blocking(move || run_sandboxed(&source, &imports, inputs)),
        )
        .await
        .map_err(|_| ExecutorError::Timeout(SANDBOX_TIMEOUT.as_secs_f64()))?
        .map_err(|e| ExecutorError::Runtime(format!("sandbox task panicked: {e}")))??;

        Ok(ExecutorOutput::value(result))
    }
}

/// Builds a fresh Lua VM with only the named globals surviving from the
/// standard library, loads `inputs` as a table, runs `source`, and
/// converts the script's return value back to JSON.
fn run_sandboxed(source: &str, imports: &[String], inputs: Value) -> Result<Value> {
    let lua = Lua::new();
    lua.set_memory_limit(SANDBOX_MEMORY_LIMIT_BYTES)
        .map_err(|e| ExecutorError::Runtime(format!("failed to set sandbox memory limit: {e}")))?;

    let globals = lua.globals();
    let allowed: std::collections::HashSet<&str> = imports.iter().map(String::as_str).collect();
    for key in ["os", "io", "package", "debug", "dofile", "loadfile", "require"] {
        if !allowed.contains(key) {
            globals
                .set(key, LuaValue::Nil)
                .map_err(|e| ExecutorError::Runtime(format!("failed to lock down sandbox global '{key}': {e}")))?;
        }
    }

    let lua_inputs = json_to_lua(&lua, &inputs)
        .map_err(|e| ExecutorError::Validation(format!("failed to marshal inputs into Lua: {e}")))?;
    globals
        .set("inputs", lua_inputs)
        .map_err(|e| ExecutorError::Runtime(format!("failed to bind inputs: {e}")))?;

    let value: LuaValue = lua
        .load(source)
        .eval()
        .map_err(|e| ExecutorError::Runtime(format!("lua script failed: {e}")))?;

    lua_to_json(&value).map_err(|e| ExecutorError::Runtime(format!("failed to marshal script result: {e}")))
}

fn json_to_lua(lua: &Lua, value: &Value) -> mlua::Result<LuaValue> {
    Ok(match value {
        Value::Null => LuaValue::Nil,
        Value::Bool(b) => LuaValue::Boolean(*b),
        Value::Number(n) => LuaValue::Number(n.as_f64().unwrap_or(0.0)),
        Value::String(s) => LuaValue::String(lua.create_string(s)?),
        Value::Array(items) => {
            let table = lua.create_table()?;
            for (i, item) in items.iter().enumerate() {
                table.set(i + 1, json_to_lua(lua, item)?)?;
            }
            LuaValue::Table(table)
        }
        Value::Object(map) => {
            let table = lua.create_table()?;
            for (key, item) in map {
                table.set(key.as_str(), json_to_lua(lua, item)?)?;
            }
            LuaValue::Table(table)
        }
    })
}

fn lua_to_json(value: &LuaValue) -> mlua::Result<Value> {
    Ok(match value {
        LuaValue::Nil => Value::Null,
        LuaValue::Boolean(b) => Value::Bool(*b),
        LuaValue::Integer(i) => Value::Number((*i).into()),
        LuaValue::Number(n) => serde_json::Number::from_f64(*n).map(Value::Number).unwrap_or(Value::Null),
        LuaValue::String(s) => Value::String(s.to_str()?.to_string()),
        LuaValue::Table(table) => {
            let len = table.raw_len();
            if len > 0 {
                let mut items = Vec::with_capacity(len);
                for i in 1..=len {
                    let item: LuaValue = table.get(i)?;
                    items.push(lua_to_json(&item)?);
                }
                Value::Array(items)
            } else {
                let mut map = serde_json::Map::new();
                for pair in table.clone().pairs::<String, LuaValue>() {
                    let (key, item) = pair?;
                    map.insert(key, lua_to_json(&item)?);
                }
                Value::Object(map)
            }
        }
        _ => Value::Null,
    })
}
