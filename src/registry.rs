use crate::backend::Closer;

use std::sync::{Arc, Mutex, PoisonError};

/// Keeps the clients created by [`LogWriter::new`](crate::writer::LogWriter::new) so their
/// buffers can be flushed and their connections closed when the application shuts down.
///
/// Owned by whatever orchestrates shutdown. Create the writers during start up and call
/// [`close`](ClientRegistry::close) once nothing logs anymore.
#[derive(Default)]
pub struct ClientRegistry {
    clients: Mutex<Vec<Arc<dyn Closer>>>,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn register(&self, client: Arc<dyn Closer>) {
        self.lock().push(client);
    }

    /// The number of registered clients.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Closes every registered client in the order they were created, waiting for their
    /// buffered entries to be flushed.
    ///
    /// Close errors are ignored. Clients stay registered, so calling this again closes them
    /// again.
    pub fn close(&self) {
        let clients = self.lock().clone();
        for client in clients {
            let _ = client.close();
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Arc<dyn Closer>>> {
        self.clients.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::mock::{MockClient, INVALID_PARENT, UNREACHABLE_PARENT};
    use crate::writer::LogWriter;
    use googlelog::Error;
    use pretty_assertions::assert_eq;

    // Records the order of close calls in a shared journal.
    struct Journaled {
        name: &'static str,
        journal: Arc<Mutex<Vec<&'static str>>>,
        fail: bool,
    }

    impl Closer for Journaled {
        fn close(&self) -> Result<(), Error> {
            self.journal.lock().unwrap().push(self.name);
            if self.fail {
                return Err(Error::Closed);
            }
            Ok(())
        }
    }

    fn journaled(
        registry: &ClientRegistry,
        journal: &Arc<Mutex<Vec<&'static str>>>,
        name: &'static str,
        fail: bool,
    ) {
        registry.register(Arc::new(Journaled {
            name,
            journal: journal.clone(),
            fail,
        }));
    }

    #[test]
    fn closes_in_creation_order_despite_failures() {
        let registry = ClientRegistry::new();
        let journal = Arc::new(Mutex::new(Vec::new()));
        journaled(&registry, &journal, "first", false);
        journaled(&registry, &journal, "already-closed", true);
        journaled(&registry, &journal, "last", false);

        registry.close();

        assert_eq!(
            vec!["first", "already-closed", "last"],
            *journal.lock().unwrap()
        );
    }

    #[test]
    fn closing_twice_closes_again() {
        let registry = ClientRegistry::new();
        let journal = Arc::new(Mutex::new(Vec::new()));
        journaled(&registry, &journal, "only", false);

        registry.close();
        registry.close();

        assert_eq!(vec!["only", "only"], *journal.lock().unwrap());
    }

    #[tokio::test]
    async fn managed_writer_registers_its_client() {
        let registry = ClientRegistry::new();
        let writer = LogWriter::<MockClient>::new(&registry, "projects/p", "app", (), ())
            .await
            .unwrap();
        assert_eq!(1, registry.len());
        assert_eq!(2, Arc::strong_count(writer.client()));
    }

    #[tokio::test]
    async fn close_reaches_managed_clients() {
        let registry = ClientRegistry::new();
        let first = LogWriter::<MockClient>::new(&registry, "projects/a", "app", (), ())
            .await
            .unwrap();
        let second = LogWriter::<MockClient>::new(&registry, "projects/b", "app", (), ())
            .await
            .unwrap();
        let unmanaged = LogWriter::with_client(Arc::new(MockClient::new()), "app", ());

        registry.close();

        assert_eq!(1, first.client().recording.close_count());
        assert_eq!(1, second.client().recording.close_count());
        assert_eq!(0, unmanaged.client().recording.close_count());
    }

    #[test]
    fn unmanaged_writer_is_not_registered() {
        let registry = ClientRegistry::new();
        let _writer = LogWriter::with_client(Arc::new(MockClient::new()), "app", ());
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn failed_connect_registers_nothing() {
        let registry = ClientRegistry::new();
        let result =
            LogWriter::<MockClient>::new(&registry, INVALID_PARENT, "app", (), ()).await;
        assert!(matches!(
            result,
            Err(crate::Error::Backend(Error::InvalidParent(_)))
        ));
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn failed_ping_registers_nothing() {
        let registry = ClientRegistry::new();
        let result =
            LogWriter::<MockClient>::new(&registry, UNREACHABLE_PARENT, "app", (), ()).await;
        assert!(result.is_err());
        assert!(registry.is_empty());
    }
}
