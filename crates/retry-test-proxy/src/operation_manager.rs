//! Per-request-type retry instruction queues.
//!
//! The [`OperationManager`] is the only owner of the instruction table. Each
//! call to [`OperationManager::retrieve_instruction`] consumes exactly one
//! step of the front rule for that request type: either one skip or one
//! retry. The whole decide-and-decrement sequence runs under a single lock so
//! concurrent requests can never double-inject or double-skip.

use crate::config::RetryConfig;
use crate::request_type::RequestType;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use tracing::debug;

/// A rule in an instruction queue. Counters only ever go down.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryRule {
    pub skip_count: u32,
    pub retry_count: u32,
    pub instruction: String,
}

impl RetryRule {
    fn is_exhausted(&self) -> bool {
        self.skip_count == 0 && self.retry_count == 0
    }
}

impl From<&RetryConfig> for RetryRule {
    fn from(config: &RetryConfig) -> Self {
        Self {
            skip_count: config.skip_count,
            retry_count: config.retry_count,
            instruction: config.retry_instruction.clone(),
        }
    }
}

/// Owns the instruction queues, built once at startup.
#[derive(Debug, Default)]
pub struct OperationManager {
    queues: Mutex<HashMap<RequestType, VecDeque<RetryRule>>>,
}

impl OperationManager {
    /// Group rules by request type, preserving configuration order.
    pub fn new(rules: &[RetryConfig]) -> Self {
        let mut queues: HashMap<RequestType, VecDeque<RetryRule>> = HashMap::new();
        for config in rules {
            let rule = RetryRule::from(config);
            if rule.is_exhausted() {
                debug!("Dropping empty retry rule for {}", config.method);
                continue;
            }
            queues.entry(config.method).or_default().push_back(rule);
        }

        Self {
            queues: Mutex::new(queues),
        }
    }

    /// Consume the next step for `request_type`.
    ///
    /// Returns the instruction to inject, or `None` when the call is spent as
    /// a skip, the type has no rules, or every rule is exhausted.
    pub fn retrieve_instruction(&self, request_type: RequestType) -> Option<String> {
        let mut queues = self.queues.lock();
        let queue = queues.get_mut(&request_type)?;

        while let Some(front) = queue.front_mut() {
            if front.skip_count > 0 {
                front.skip_count -= 1;
                return None;
            }
            if front.retry_count > 0 {
                front.retry_count -= 1;
                return Some(front.instruction.clone());
            }
            queue.pop_front();
        }

        None
    }

    /// Whether any rule was configured for `request_type`.
    pub fn is_configured(&self, request_type: RequestType) -> bool {
        self.queues.lock().contains_key(&request_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn rule(method: RequestType, skip: u32, retry: u32, instruction: &str) -> RetryConfig {
        RetryConfig {
            method,
            file_name: None,
            retry_instruction: instruction.to_string(),
            retry_count: retry,
            skip_count: skip,
        }
    }

    #[test]
    fn test_representative_scenario() {
        let manager = OperationManager::new(&[
            rule(RequestType::XmlRead, 0, 2, "retry_GET"),
            rule(RequestType::JsonStat, 1, 1, "retry_STAT"),
        ]);

        assert_eq!(
            manager.retrieve_instruction(RequestType::XmlRead).as_deref(),
            Some("retry_GET")
        );
        assert_eq!(
            manager.retrieve_instruction(RequestType::XmlRead).as_deref(),
            Some("retry_GET")
        );
        assert_eq!(manager.retrieve_instruction(RequestType::XmlRead), None);

        assert_eq!(manager.retrieve_instruction(RequestType::JsonStat), None);
        assert_eq!(
            manager.retrieve_instruction(RequestType::JsonStat).as_deref(),
            Some("retry_STAT")
        );
        assert_eq!(manager.retrieve_instruction(RequestType::JsonStat), None);

        assert_eq!(manager.retrieve_instruction(RequestType::JsonUpdate), None);
        assert_eq!(manager.retrieve_instruction(RequestType::JsonUpdate), None);
    }

    #[test]
    fn test_rules_consumed_in_order() {
        let manager = OperationManager::new(&[
            rule(RequestType::XmlRead, 1, 1, "first"),
            rule(RequestType::JsonStat, 0, 1, "other-type"),
            rule(RequestType::XmlRead, 0, 2, "second"),
        ]);

        let sequence: Vec<Option<String>> = (0..5)
            .map(|_| manager.retrieve_instruction(RequestType::XmlRead))
            .collect();
        assert_eq!(
            sequence,
            vec![
                None,
                Some("first".to_string()),
                Some("second".to_string()),
                Some("second".to_string()),
                None,
            ]
        );
    }

    #[test]
    fn test_skip_count_applies_before_retries() {
        let manager = OperationManager::new(&[rule(RequestType::JsonCreate, 3, 1, "X")]);
        for _ in 0..3 {
            assert_eq!(manager.retrieve_instruction(RequestType::JsonCreate), None);
        }
        assert_eq!(
            manager.retrieve_instruction(RequestType::JsonCreate).as_deref(),
            Some("X")
        );
        assert_eq!(manager.retrieve_instruction(RequestType::JsonCreate), None);
    }

    #[test]
    fn test_exhausted_rules_never_revisited() {
        let manager = OperationManager::new(&[rule(RequestType::XmlRead, 0, 1, "X")]);
        assert!(manager.retrieve_instruction(RequestType::XmlRead).is_some());
        for _ in 0..50 {
            assert_eq!(manager.retrieve_instruction(RequestType::XmlRead), None);
        }
        // Queue stays registered even when empty
        assert!(manager.is_configured(RequestType::XmlRead));
    }

    #[test]
    fn test_empty_rules_are_dropped_at_build() {
        let manager = OperationManager::new(&[
            rule(RequestType::XmlRead, 0, 0, "never"),
            rule(RequestType::XmlRead, 0, 1, "X"),
        ]);
        assert_eq!(
            manager.retrieve_instruction(RequestType::XmlRead).as_deref(),
            Some("X")
        );
        assert!(!OperationManager::new(&[rule(RequestType::JsonList, 0, 0, "")])
            .is_configured(RequestType::JsonList));
    }

    #[test]
    fn test_unconfigured_manager_never_injects() {
        let manager = OperationManager::default();
        for rt in RequestType::ALL {
            assert_eq!(manager.retrieve_instruction(rt), None);
            assert!(!manager.is_configured(rt));
        }
    }

    #[test]
    fn test_concurrent_consumption_is_exactly_once() {
        let manager = Arc::new(OperationManager::new(&[
            rule(RequestType::XmlRead, 5, 7, "A"),
            rule(RequestType::XmlRead, 3, 11, "B"),
        ]));
        let injected_a = Arc::new(AtomicUsize::new(0));
        let injected_b = Arc::new(AtomicUsize::new(0));
        let empty = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let manager = Arc::clone(&manager);
                let injected_a = Arc::clone(&injected_a);
                let injected_b = Arc::clone(&injected_b);
                let empty = Arc::clone(&empty);
                std::thread::spawn(move || {
                    for _ in 0..25 {
                        match manager.retrieve_instruction(RequestType::XmlRead).as_deref() {
                            Some("A") => injected_a.fetch_add(1, Ordering::SeqCst),
                            Some("B") => injected_b.fetch_add(1, Ordering::SeqCst),
                            Some(other) => panic!("unexpected instruction {other}"),
                            None => empty.fetch_add(1, Ordering::SeqCst),
                        };
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(injected_a.load(Ordering::SeqCst), 7);
        assert_eq!(injected_b.load(Ordering::SeqCst), 11);
        // 200 calls total, 18 injected
        assert_eq!(empty.load(Ordering::SeqCst), 200 - 18);
        assert_eq!(manager.retrieve_instruction(RequestType::XmlRead), None);
    }

    #[test]
    fn test_concurrent_types_are_independent() {
        let manager = Arc::new(OperationManager::new(&[
            rule(RequestType::XmlRead, 0, 100, "read"),
            rule(RequestType::JsonStat, 0, 100, "stat"),
        ]));

        let handles: Vec<_> = [RequestType::XmlRead, RequestType::JsonStat]
            .into_iter()
            .map(|rt| {
                let manager = Arc::clone(&manager);
                std::thread::spawn(move || {
                    (0..100)
                        .filter(|_| manager.retrieve_instruction(rt).is_some())
                        .count()
                })
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.join().unwrap(), 100);
        }
    }
}
