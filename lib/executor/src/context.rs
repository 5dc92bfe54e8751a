use parking_lot::Mutex;
use serde_json::{Map, Value};

use crate::response::graphql_error::GraphQLError;

/// Per-request result tree and error list.
///
/// Each lock is held for one read or one merge and never across an await.
/// `data` is always locked before `errors`.
#[derive(Debug)]
pub struct ExecutionContext {
    data: Mutex<Value>,
    errors: Mutex<Vec<GraphQLError>>,
}

impl Default for ExecutionContext {
    fn default() -> Self {
        Self::new()
    }
}

impl ExecutionContext {
    pub fn new() -> Self {
        ExecutionContext {
            data: Mutex::new(Value::Object(Map::new())),
            errors: Mutex::new(Vec::new()),
        }
    }

    pub fn read<R>(&self, f: impl FnOnce(&Value) -> R) -> R {
        f(&self.data.lock())
    }

    pub fn write<R>(&self, f: impl FnOnce(&mut Value, &mut Vec<GraphQLError>) -> R) -> R {
        let mut data = self.data.lock();
        let mut errors = self.errors.lock();
        f(&mut data, &mut errors)
    }

    pub fn into_parts(self) -> (Value, Vec<GraphQLError>) {
        (self.data.into_inner(), self.errors.into_inner())
    }
}
