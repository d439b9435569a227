use gemini_realtime::{ToolCall, ToolResponse};
use std::{collections::HashMap, sync::Arc};
use tokio::{sync::mpsc, task::AbortHandle};
use tracing::{debug, warn};

use super::{ToolBridge, response_payload};

/// Runs each tool call once and yields exactly one response per call that
/// was not cancelled.
///
/// Finished calls arrive on the receiver returned by [`ToolCallRouter::new`]
/// and must be passed through [`ToolCallRouter::settle`] before they are sent;
/// that is where late results of cancelled calls are discarded.
pub struct ToolCallRouter {
    bridge: Arc<dyn ToolBridge>,
    in_flight: HashMap<String, AbortHandle>,
    results: mpsc::UnboundedSender<ToolResponse>,
}

impl ToolCallRouter {
    pub fn new(bridge: Arc<dyn ToolBridge>) -> (Self, mpsc::UnboundedReceiver<ToolResponse>) {
        let (results, results_rx) = mpsc::unbounded_channel();
        let router = Self {
            bridge,
            in_flight: HashMap::new(),
            results,
        };
        (router, results_rx)
    }

    pub fn dispatch(&mut self, calls: Vec<ToolCall>) {
        for call in calls {
            if self.in_flight.contains_key(&call.id) {
                warn!(id = %call.id, "Ignoring duplicate tool call id");
                continue;
            }
            let bridge = self.bridge.clone();
            let results = self.results.clone();
            let id = call.id.clone();
            let handle = tokio::spawn(async move {
                let outcome = bridge.execute(&call.name, call.arguments).await;
                if let Err(e) = &outcome {
                    warn!(tool = %call.name, error = %e, "Tool call failed");
                }
                let _ = results.send(ToolResponse {
                    id: call.id,
                    name: call.name,
                    result: response_payload(outcome),
                });
            });
            debug!(%id, "Tool call dispatched");
            self.in_flight.insert(id, handle.abort_handle());
        }
    }

    /// Accepts a finished call if it is still in flight.
    pub fn settle(&mut self, response: ToolResponse) -> Option<ToolResponse> {
        match self.in_flight.remove(&response.id) {
            Some(_) => Some(response),
            None => {
                debug!(id = %response.id, "Discarding result of a cancelled tool call");
                None
            }
        }
    }

    /// Aborts the given calls; returns how many were still in flight.
    pub fn cancel(&mut self, ids: &[String]) -> usize {
        ids.iter()
            .filter_map(|id| self.in_flight.remove(id))
            .map(|handle| handle.abort())
            .count()
    }

    pub fn cancel_all(&mut self) {
        for (_, handle) in self.in_flight.drain() {
            handle.abort();
        }
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }
}

impl Drop for ToolCallRouter {
    fn drop(&mut self) {
        self.cancel_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::{MockToolBridge, ToolBridgeError};
    use serde_json::json;
    use std::time::Duration;

    fn call(id: &str, name: &str) -> ToolCall {
        ToolCall {
            id: id.to_string(),
            name: name.to_string(),
            arguments: json!({}),
        }
    }

    #[tokio::test]
    async fn each_call_gets_one_correlated_response() {
        let mut bridge = MockToolBridge::new();
        bridge
            .expect_execute()
            .times(2)
            .returning(|name, _| Ok(json!({ "tool": name })));
        let (mut router, mut results) = ToolCallRouter::new(Arc::new(bridge));

        router.dispatch(vec![call("a", "first"), call("b", "second")]);
        let mut settled = Vec::new();
        for _ in 0..2 {
            let response = results.recv().await.unwrap();
            settled.push(router.settle(response).unwrap());
        }
        settled.sort_by(|x, y| x.id.cmp(&y.id));
        assert_eq!(settled[0].result, json!({ "tool": "first" }));
        assert_eq!(settled[1].name, "second");
        assert_eq!(router.in_flight(), 0);
    }

    #[tokio::test]
    async fn failures_become_error_payloads() {
        let mut bridge = MockToolBridge::new();
        bridge.expect_execute().returning(|name, _| {
            Err(ToolBridgeError::Tool {
                name: name.to_string(),
                message: "disk full".to_string(),
            })
        });
        let (mut router, mut results) = ToolCallRouter::new(Arc::new(bridge));

        router.dispatch(vec![call("x", "take_note")]);
        let response = router.settle(results.recv().await.unwrap()).unwrap();
        assert_eq!(
            response.result,
            json!({ "error": "Tool 'take_note' failed: disk full" })
        );
    }

    #[tokio::test]
    async fn cancelled_call_never_yields_a_response() {
        let mut bridge = MockToolBridge::new();
        bridge.expect_execute().returning(|_, _| Ok(json!("late")));
        let (mut router, mut results) = ToolCallRouter::new(Arc::new(bridge));

        router.dispatch(vec![call("slow", "lookup")]);
        // The executor may already have finished; its result still sits unsettled.
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(router.cancel(&["slow".to_string()]), 1);

        while let Ok(response) = results.try_recv() {
            assert!(router.settle(response).is_none());
        }
        assert_eq!(router.in_flight(), 0);
    }

    #[tokio::test]
    async fn cancel_ignores_unknown_ids() {
        let bridge = MockToolBridge::new();
        let (mut router, _results) = ToolCallRouter::new(Arc::new(bridge));
        assert_eq!(router.cancel(&["nope".to_string()]), 0);
    }

    #[tokio::test]
    async fn duplicate_ids_execute_once() {
        let mut bridge = MockToolBridge::new();
        bridge.expect_execute().times(1).returning(|_, _| Ok(json!({})));
        let (mut router, mut results) = ToolCallRouter::new(Arc::new(bridge));

        router.dispatch(vec![call("dup", "t"), call("dup", "t")]);
        assert_eq!(router.in_flight(), 1);
        assert!(router.settle(results.recv().await.unwrap()).is_some());
    }

    #[tokio::test]
    async fn cancel_all_clears_everything() {
        let mut bridge = MockToolBridge::new();
        bridge.expect_execute().returning(|_, _| Ok(json!({})));
        let (mut router, mut results) = ToolCallRouter::new(Arc::new(bridge));

        router.dispatch(vec![call("1", "t"), call("2", "t")]);
        router.cancel_all();
        assert_eq!(router.in_flight(), 0);
        tokio::time::sleep(Duration::from_millis(10)).await;
        while let Ok(response) = results.try_recv() {
            assert!(router.settle(response).is_none());
        }
    }
}
