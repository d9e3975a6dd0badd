/// Routing of inbound extension results by their echoed source tag
///
/// Results of commands issued from the interactive control surface go to the
/// monitoring feed; everything else (tagged `mcp`, or untagged) is offered to
/// the correlator.

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::channel::ResultHandler;
use crate::correlator::{Correlator, Resolution};
use crate::domain::{ResultEnvelope, Source};
use crate::mcp::{Monitor, MonitorEvent};

pub struct ResultRouter {
    correlator: Correlator,
    monitor: Monitor,
}

impl ResultRouter {
    pub fn new(correlator: Correlator, monitor: Monitor) -> Self {
        Self { correlator, monitor }
    }
}

#[async_trait]
impl ResultHandler for ResultRouter {
    async fn handle_result(&self, envelope: ResultEnvelope) {
        match envelope.source() {
            Some(Source::Ui) => {
                debug!(action = ?envelope.action(), "Forwarding control surface result");
                self.monitor.publish(MonitorEvent::ui_result(envelope));
            }
            Some(Source::Mcp) | None => {
                let echoed = envelope.request_id();
                match self.correlator.resolve(envelope).await {
                    Resolution::Direct(id) => debug!(request_id = %id.short(), "Result matched by id"),
                    Resolution::Fifo(id) => debug!(request_id = %id.short(), "Result matched by arrival order"),
                    Resolution::Unmatched => warn!(
                        request_id = ?echoed.as_ref().map(|id| id.as_str()),
                        "Discarding result with no pending request"
                    ),
                }
            }
        }
    }
}
