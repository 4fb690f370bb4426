//! Ordered post-mutation hooks.
//!
//! Observers that must see every state change (queue-pressure warnings,
//! diagnostics, bridged integrations) register here and are invoked
//! synchronously after each mutation, in registration order, with the
//! record kind and a snapshot of the new state.

use std::fmt;
use std::sync::Arc;

use tracing::trace;

use crate::notify::{Notice, Notifier};

use super::AppData;

/// Which record a mutation touched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MutationKind {
    Settings,
    Contacts,
    Gallery,
    Background,
    Board,
}

impl MutationKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Settings => "settings",
            Self::Contacts => "contacts",
            Self::Gallery => "gallery",
            Self::Background => "background",
            Self::Board => "board",
        }
    }
}

impl fmt::Display for MutationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

type HookFn = dyn Fn(MutationKind, &AppData) + Send + Sync;

struct Hook {
    name: String,
    callback: Box<HookFn>,
}

/// Named observers run after every mutation, in registration order.
#[derive(Default)]
pub struct HookRegistry {
    hooks: Vec<Hook>,
}

impl HookRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an observer. Order of registration is order of invocation.
    pub fn register<F>(&mut self, name: impl Into<String>, callback: F)
    where
        F: Fn(MutationKind, &AppData) + Send + Sync + 'static,
    {
        self.hooks.push(Hook {
            name: name.into(),
            callback: Box::new(callback),
        });
    }

    /// Invoke every hook with the mutated kind and the new state.
    pub fn run(&self, kind: MutationKind, data: &AppData) {
        for hook in &self.hooks {
            trace!(hook = %hook.name, %kind, "running post-mutation hook");
            (hook.callback)(kind, data);
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }
}

impl fmt::Debug for HookRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.hooks.iter().map(|hook| &hook.name))
            .finish()
    }
}

/// Waiting count at which the queue-pressure hook warns.
pub const QUEUE_PRESSURE_THRESHOLD: u32 = 5;

/// The built-in queue-pressure observer: after board changes it warns when
/// the queue is long and celebrates when every chair is busy.
pub fn queue_pressure(notifier: Arc<dyn Notifier>) -> impl Fn(MutationKind, &AppData) {
    move |kind, data| {
        if kind != MutationKind::Board {
            return;
        }
        if data.board.waiting_customers >= QUEUE_PRESSURE_THRESHOLD {
            notifier.notify(Notice::warning(format!(
                "{} customers are waiting",
                data.board.waiting_customers
            )));
        }
        if data.board.all_occupied() {
            notifier.notify(Notice::info("all chairs are busy"));
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use crate::notify::NoticeKind;

    #[derive(Default)]
    struct CaptureNotifier {
        notices: Mutex<Vec<Notice>>,
    }

    impl Notifier for CaptureNotifier {
        fn notify(&self, notice: Notice) {
            self.notices.lock().unwrap().push(notice);
        }
    }

    #[test]
    fn test_hooks_run_in_registration_order() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let mut registry = HookRegistry::new();
        for label in ["first", "second", "third"] {
            let order = Arc::clone(&order);
            registry.register(label, move |_, _| order.lock().unwrap().push(label));
        }

        registry.run(MutationKind::Contacts, &AppData::default());
        assert_eq!(*order.lock().unwrap(), vec!["first", "second", "third"]);
    }

    #[test]
    fn test_queue_pressure_warns_at_threshold() {
        let notifier = Arc::new(CaptureNotifier::default());
        let hook = queue_pressure(Arc::clone(&notifier) as Arc<dyn Notifier>);

        let mut data = AppData::default();
        data.board.adjust_waiting(4, 20);
        hook(MutationKind::Board, &data);
        assert!(notifier.notices.lock().unwrap().is_empty());

        data.board.adjust_waiting(1, 20);
        hook(MutationKind::Board, &data);
        let notices = notifier.notices.lock().unwrap();
        assert_eq!(notices.len(), 1);
        assert_eq!(notices.first().unwrap().kind, NoticeKind::Warning);
    }

    #[test]
    fn test_queue_pressure_celebrates_full_house() {
        let notifier = Arc::new(CaptureNotifier::default());
        let hook = queue_pressure(Arc::clone(&notifier) as Arc<dyn Notifier>);

        let mut data = AppData::default();
        for chair in 1..=data.settings.chair_count {
            data.board.toggle_chair(chair).unwrap();
        }
        hook(MutationKind::Board, &data);

        let notices = notifier.notices.lock().unwrap();
        assert_eq!(notices.len(), 1);
        assert_eq!(notices.first().unwrap().kind, NoticeKind::Info);
    }

    #[test]
    fn test_queue_pressure_ignores_record_mutations() {
        let notifier = Arc::new(CaptureNotifier::default());
        let hook = queue_pressure(Arc::clone(&notifier) as Arc<dyn Notifier>);

        let mut data = AppData::default();
        data.board.adjust_waiting(10, 20);
        hook(MutationKind::Settings, &data);
        assert!(notifier.notices.lock().unwrap().is_empty());
    }
}
