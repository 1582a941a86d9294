//! Server pool reachability probing.

use std::time::Duration;
use tracing::{debug, warn};

use crate::transport::DirectoryTransport;

/// Returns the first server in `servers` that accepts a raw connection on `port`.
///
/// Candidates are probed one at a time in pool order and the first success ends the
/// scan. A failed probe is logged and never raised; `None` means no candidate answered.
pub async fn find_available_server(
    transport: &dyn DirectoryTransport,
    servers: &[String],
    port: u16,
    timeout: Duration,
) -> Option<String> {
    for server in servers {
        match transport.probe(server, port, timeout).await {
            Ok(()) => {
                debug!(host = %server, port, "directory server reachable");
                return Some(server.clone());
            }
            Err(err) => {
                warn!(host = %server, port, error = %err, "directory server unreachable");
            }
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MockDirectoryTransport;
    use mockall::predicate::{always, eq};
    use std::io;

    fn pool(hosts: &[&str]) -> Vec<String> {
        hosts.iter().map(|host| (*host).to_string()).collect()
    }

    fn refused() -> io::Result<()> {
        Err(io::Error::new(io::ErrorKind::ConnectionRefused, "refused"))
    }

    #[tokio::test]
    async fn returns_first_reachable_and_stops() {
        let mut transport = MockDirectoryTransport::new();
        let mut sequence = mockall::Sequence::new();
        transport
            .expect_probe()
            .with(eq("dc1"), eq(389), always())
            .times(1)
            .in_sequence(&mut sequence)
            .returning(|_, _, _| refused());
        transport
            .expect_probe()
            .with(eq("dc2"), eq(389), always())
            .times(1)
            .in_sequence(&mut sequence)
            .returning(|_, _, _| Ok(()));
        transport
            .expect_probe()
            .with(eq("dc3"), always(), always())
            .never();

        let found = find_available_server(
            &transport,
            &pool(&["dc1", "dc2", "dc3"]),
            389,
            Duration::from_secs(5),
        )
        .await;
        assert_eq!(found.as_deref(), Some("dc2"));
    }

    #[tokio::test]
    async fn first_candidate_short_circuits() {
        let mut transport = MockDirectoryTransport::new();
        transport
            .expect_probe()
            .times(1)
            .returning(|_, _, _| Ok(()));

        let found =
            find_available_server(&transport, &pool(&["dc1", "dc2"]), 636, Duration::from_secs(1))
                .await;
        assert_eq!(found.as_deref(), Some("dc1"));
    }

    #[tokio::test]
    async fn all_unreachable_returns_none() {
        let mut transport = MockDirectoryTransport::new();
        transport
            .expect_probe()
            .times(2)
            .returning(|_, _, _| refused());

        let found =
            find_available_server(&transport, &pool(&["dc1", "dc2"]), 389, Duration::from_secs(1))
                .await;
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn empty_pool_probes_nothing() {
        let mut transport = MockDirectoryTransport::new();
        transport.expect_probe().never();

        let found = find_available_server(&transport, &[], 389, Duration::from_secs(1)).await;
        assert!(found.is_none());
    }
}
