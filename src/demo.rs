//! Demo method set served by the `switchboard` binary.

use serde_json::{json, Value};
use switchboard_protocol::RpcError;
use switchboard_server::{Dispatcher, HandlerError};
use tracing::info;

/// Register `subtract`, `sum`, `get_data`, `notify_hello` and `echo`.
pub fn register(dispatcher: &Dispatcher) {
    dispatcher.register("subtract", |params, reply| {
        let difference = subtract(params.as_ref())?;
        if let Some(reply) = reply {
            reply.ok(json!(difference));
        }
        Ok(())
    });

    dispatcher.register("sum", |params, reply| {
        let Some(reply) = reply else {
            return Ok(());
        };
        match sum(params.as_ref()) {
            Ok(total) => reply.ok(json!(total)),
            Err(e) => reply.err(e),
        }
        Ok(())
    });

    dispatcher.register("get_data", |_, reply| {
        if let Some(reply) = reply {
            reply.ok(json!(["hello", 5]));
        }
        Ok(())
    });

    dispatcher.register("notify_hello", |params, _| {
        info!("notify_hello: {}", params.unwrap_or_default());
        Ok(())
    });

    dispatcher.register_async("echo", |params| async move {
        Ok::<_, RpcError>(params.unwrap_or(Value::Null))
    });
}

fn operand(value: Option<&Value>) -> Result<f64, RpcError> {
    value
        .and_then(Value::as_f64)
        .ok_or_else(|| RpcError::invalid_params("operands must be numbers"))
}

/// `[minuend, subtrahend]` or `{"minuend": .., "subtrahend": ..}`.
///
/// Bad params are a handler failure, so calls get Internal Error.
fn subtract(params: Option<&Value>) -> Result<Value, HandlerError> {
    let (minuend, subtrahend) = match params {
        Some(Value::Array(items)) => (operand(items.first())?, operand(items.get(1))?),
        Some(Value::Object(named)) => (
            operand(named.get("minuend"))?,
            operand(named.get("subtrahend"))?,
        ),
        _ => return Err(HandlerError::failed("subtract expects two operands")),
    };
    Ok(number(minuend - subtrahend))
}

fn sum(params: Option<&Value>) -> Result<Value, RpcError> {
    let items = params
        .and_then(Value::as_array)
        .ok_or_else(|| RpcError::invalid_params("sum expects an array of numbers"))?;
    let total = items
        .iter()
        .map(|item| operand(Some(item)))
        .sum::<Result<f64, RpcError>>()?;
    Ok(number(total))
}

/// Integral results are written as integers.
fn number(value: f64) -> Value {
    if value.fract() == 0.0 && value.abs() < i64::MAX as f64 {
        json!(value as i64)
    } else {
        json!(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use switchboard_transport::MemoryChannel;

    #[tokio::test]
    async fn notify_hello_is_silent_and_dispatch_continues() {
        let (channel, mut peer) = MemoryChannel::new();
        let _dispatcher = Dispatcher::attach_with(channel.clone(), register);

        channel.deliver(r#"{"jsonrpc": "2.0", "method": "notify_hello", "params": [7]}"#);
        channel.deliver(r#"{"jsonrpc": "2.0", "method": "notify_hello"}"#);
        channel.deliver(r#"{"jsonrpc": "2.0", "method": "get_data", "id": 1}"#);

        let resp = peer.recv_json().await.unwrap();
        assert_eq!(resp["id"], 1);
        assert_eq!(resp["result"], json!(["hello", 5]));
        assert!(peer.try_recv().is_none());
    }

    #[test]
    fn subtract_positional_and_named() {
        assert_eq!(subtract(Some(&json!([42, 23]))).unwrap(), json!(19));
        assert_eq!(
            subtract(Some(&json!({"subtrahend": 23, "minuend": 42}))).unwrap(),
            json!(19)
        );
        assert_eq!(subtract(Some(&json!([1.5, 1]))).unwrap(), json!(0.5));
    }

    #[test]
    fn subtract_rejects_missing_operands() {
        assert!(subtract(None).is_err());
        assert!(subtract(Some(&json!([1]))).is_err());
        assert!(subtract(Some(&json!(["a", 1]))).is_err());
    }

    #[test]
    fn sum_of_numbers() {
        assert_eq!(sum(Some(&json!([1, 2, 4]))).unwrap(), json!(7));
        assert_eq!(sum(Some(&json!([]))).unwrap(), json!(0));
        let err = sum(Some(&json!({"a": 1}))).unwrap_err();
        assert_eq!(err.code, -32602);
    }
}
