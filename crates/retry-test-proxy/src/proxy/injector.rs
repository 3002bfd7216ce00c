//! Attaches retry tests to outbound requests.
//!
//! The injector consumes one instruction step from the [`OperationManager`]
//! and, when an instruction comes back, registers a retry test with the
//! control plane and tags the outbound request with its id. The instruction
//! lock is released before the control-plane call starts.

use super::headers::{RetryHeadersExt, X_RETRY_TEST_ID};
use crate::control_plane::{InstructionMap, RetryTestRegistry};
use crate::operation_manager::OperationManager;
use crate::request_type::RequestType;
use hyper::Request;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// What happened to one outbound request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InjectionOutcome {
    /// No instruction was due; the request goes out unchanged.
    Passthrough,
    /// The request carries `x-retry-test-id: test_id`.
    Injected { test_id: String },
    /// An instruction was due but could not be attached.
    Failed,
}

impl InjectionOutcome {
    pub fn is_injected(&self) -> bool {
        matches!(self, InjectionOutcome::Injected { .. })
    }
}

pub struct FaultInjector {
    operations: OperationManager,
    registry: Arc<dyn RetryTestRegistry>,
}

impl FaultInjector {
    pub fn new(operations: OperationManager, registry: Arc<dyn RetryTestRegistry>) -> Self {
        Self {
            operations,
            registry,
        }
    }

    /// Consume the next instruction for `request_type` and attach it to
    /// `request` if one is due.
    ///
    /// Failures never propagate: the request is left untouched and the
    /// consumed instruction is not restored.
    pub async fn maybe_inject<B>(
        &self,
        request_type: RequestType,
        request: &mut Request<B>,
    ) -> InjectionOutcome {
        let operation = match request_type.operation_name() {
            Some(op) => op,
            None => return InjectionOutcome::Passthrough,
        };

        let instruction = match self.operations.retrieve_instruction(request_type) {
            Some(instruction) => instruction,
            None => {
                debug!("No retry instruction due for {}", request_type);
                return InjectionOutcome::Passthrough;
            }
        };

        let mut instructions = InstructionMap::new();
        instructions.insert(operation.to_string(), vec![instruction.clone()]);

        let test_id = match self.registry.create_retry_test(&instructions).await {
            Ok(id) => id,
            Err(e) => {
                warn!(
                    "Failed to register retry test for {} (instruction '{}'): {}",
                    request_type, instruction, e
                );
                return InjectionOutcome::Failed;
            }
        };

        if !request.set_header_value(&X_RETRY_TEST_ID, &test_id) {
            warn!(
                "Control plane returned an id that is not a valid header value: {:?}",
                test_id
            );
            return InjectionOutcome::Failed;
        }

        info!(
            "Injected retry test {} for {} (instruction '{}')",
            test_id, request_type, instruction
        );
        InjectionOutcome::Injected { test_id }
    }
}
