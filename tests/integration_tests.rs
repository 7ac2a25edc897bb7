//! Integration tests running small herds of real servers over TCP.
//!
//! Each test binds its own listeners on ephemeral ports, builds a topology
//! around them and talks to the servers through the client harness.

use serde_json::{json, Value};
use server::flood::TcpPeerSender;
use server::places::{PlaceSearch, PlaceSearchError};
use server::Server;
use shared::{ClientRecord, Topology, TopologyConfig};
use std::collections::BTreeMap;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::time::{sleep, Instant};

/// Place search that always returns the same three places.
struct CannedPlaces;

impl PlaceSearch for CannedPlaces {
    fn nearby(
        &self,
        _latitude: &str,
        _longitude: &str,
        _radius_meters: u64,
    ) -> impl Future<Output = Result<Value, PlaceSearchError>> + Send {
        async {
            Ok(json!({
                "html_attributions": [],
                "results": [{ "name": "one" }, { "name": "two" }, { "name": "three" }],
                "status": "OK"
            }))
        }
    }
}

type HerdServer = Server<TcpPeerSender, CannedPlaces>;

struct Herd {
    topology: Arc<Topology>,
    servers: BTreeMap<String, Arc<HerdServer>>,
}

impl Herd {
    /// Starts every server in `names` except those listed in `down`, which
    /// keep an address nobody listens on.
    async fn start(names: &[&str], links: &[(&str, &str)], down: &[&str]) -> Herd {
        let mut listeners = BTreeMap::new();
        let mut addresses = BTreeMap::new();
        for name in names {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            addresses.insert(name.to_string(), listener.local_addr().unwrap());
            if !down.contains(name) {
                listeners.insert(name.to_string(), listener);
            }
        }

        let topology = Arc::new(
            Topology::from_config(TopologyConfig {
                servers: addresses,
                links: links
                    .iter()
                    .map(|(a, b)| (a.to_string(), b.to_string()))
                    .collect(),
            })
            .unwrap(),
        );

        let mut servers = BTreeMap::new();
        for (name, listener) in listeners {
            let server = Arc::new(
                Server::new(
                    &name,
                    Arc::clone(&topology),
                    TcpPeerSender::new(Duration::from_secs(2)),
                    CannedPlaces,
                )
                .unwrap(),
            );
            tokio::spawn(Arc::clone(&server).run(listener));
            servers.insert(name, server);
        }

        Herd { topology, servers }
    }

    fn addr(&self, name: &str) -> SocketAddr {
        self.topology.address(name).unwrap()
    }

    async fn send(&self, name: &str, line: &str) -> String {
        client::network::send_line(self.addr(name), line, Duration::from_secs(5))
            .await
            .unwrap()
    }

    fn lookup(&self, name: &str, client_id: &str) -> Option<ClientRecord> {
        self.servers[name].directory().lookup(client_id)
    }

    /// Waits until every running server holds `client_id` at `timestamp`.
    async fn converge(&self, client_id: &str, timestamp: &str) {
        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            let done = self.servers.keys().all(|name| {
                self.lookup(name, client_id)
                    .map(|r| r.report_timestamp.as_str() == timestamp)
                    .unwrap_or(false)
            });
            if done {
                return;
            }
            assert!(
                Instant::now() < deadline,
                "herd did not converge on {} at {}",
                client_id,
                timestamp
            );
            sleep(Duration::from_millis(10)).await;
        }
    }
}

/// FLOODING TESTS
mod flooding_tests {
    use super::*;

    /// A report made at one end of a chain reaches the other end unchanged
    #[tokio::test]
    async fn flood_reaches_end_of_chain() {
        let herd = Herd::start(&["A", "B", "C"], &[("A", "B"), ("B", "C")], &[]).await;

        let reply = herd
            .send("A", "IAMAT alice +34.068930-118.445127 1520023934.918963997")
            .await;
        assert!(reply.starts_with("AT A "), "unexpected reply {:?}", reply);
        assert!(reply.ends_with(" alice +34.068930-118.445127 1520023934.918963997"));

        herd.converge("alice", "1520023934.918963997").await;

        let at_a = herd.lookup("A", "alice").unwrap();
        for name in ["B", "C"] {
            let record = herd.lookup(name, "alice").unwrap();
            assert_eq!(record, at_a);
            assert_eq!(record.origin_server, "A");
            assert_eq!(record.clock_skew.as_str(), at_a.clock_skew.as_str());
        }
    }

    /// The default herd shape has cycles; flooding still settles everywhere
    #[tokio::test]
    async fn flood_settles_on_cyclic_herd() {
        let names = ["Goloman", "Hands", "Holiday", "Welsh", "Wilkes"];
        let herd = Herd::start(&names, &shared::topology::DEFAULT_LINKS, &[]).await;

        herd.send("Welsh", "IAMAT kiwi +34.068930-118.445127 100").await;
        herd.converge("kiwi", "100").await;

        for name in names {
            assert_eq!(herd.lookup(name, "kiwi").unwrap().origin_server, "Welsh");
        }
    }

    /// The newest report wins everywhere, whichever server received it
    #[tokio::test]
    async fn newest_report_wins_across_servers() {
        let herd = Herd::start(&["A", "B", "C"], &[("A", "B"), ("B", "C")], &[]).await;

        herd.send("A", "IAMAT bob +1-1 200").await;
        herd.converge("bob", "200").await;

        let reply = herd.send("C", "IAMAT bob +2-2 150").await;
        assert!(reply.starts_with("AT C "));
        herd.send("C", "IAMAT bob +3-3 300").await;
        herd.converge("bob", "300").await;

        for name in ["A", "B", "C"] {
            let record = herd.lookup(name, "bob").unwrap();
            assert_eq!(record.origin_server, "C");
            assert_eq!(record.coordinate.as_str(), "+3-3");
        }
    }

    /// A dead neighbor does not hold up the client reply or other neighbors
    #[tokio::test]
    async fn unreachable_neighbor_is_skipped() {
        let herd = Herd::start(&["A", "B", "C"], &[("A", "B"), ("A", "C")], &["B"]).await;

        let reply = herd.send("A", "IAMAT carol +1-1 42").await;
        assert!(reply.starts_with("AT A "));

        herd.converge("carol", "42").await;
        assert!(herd.lookup("C", "carol").is_some());
    }
}

/// CLIENT PROTOCOL TESTS
mod protocol_tests {
    use super::*;

    /// Invalid commands come back prefixed with '?' and otherwise untouched
    #[tokio::test]
    async fn invalid_command_is_echoed() {
        let herd = Herd::start(&["A"], &[], &[]).await;

        let reply = herd.send("A", "IAMAT k2 +35.068930117.445127 1651567233.7065177").await;
        assert_eq!(reply, "? IAMAT k2 +35.068930117.445127 1651567233.7065177\n");

        let reply = herd.send("A", "WHATSAT nobody 10 5").await;
        assert_eq!(reply, "? WHATSAT nobody 10 5\n");
    }

    /// Relayed AT messages never get an answer
    #[tokio::test]
    async fn at_gets_no_reply() {
        let herd = Herd::start(&["A", "B"], &[("A", "B")], &[]).await;

        let reply = herd.send("A", "AT B +1.5 dave +1-1 10 B").await;
        assert_eq!(reply, "");

        // The message is applied before the connection closes.
        let record = herd.lookup("A", "dave").unwrap();
        assert_eq!(record.origin_server, "B");
        assert_eq!(record.clock_skew.as_str(), "+1.5");
    }

    /// WHATSAT returns the stored AT line and the truncated place list
    #[tokio::test]
    async fn whatsat_after_flood() {
        let herd = Herd::start(&["A", "B"], &[("A", "B")], &[]).await;

        herd.send("A", "IAMAT erin +34.068930-118.445127 100").await;
        herd.converge("erin", "100").await;

        let reply = herd.send("B", "WHATSAT erin 10 2").await;
        let (header, body) = reply.split_once('\n').unwrap();
        assert!(header.starts_with("AT A "));
        assert!(header.ends_with(" erin +34.068930-118.445127 100"));

        let parsed: Value = serde_json::from_str(body).unwrap();
        assert_eq!(parsed["results"], json!([{ "name": "one" }, { "name": "two" }]));
        assert_eq!(parsed["status"], "OK");

        let reply = herd.send("B", "WHATSAT erin 10 0").await;
        let parsed: Value = serde_json::from_str(reply.split_once('\n').unwrap().1).unwrap();
        assert_eq!(parsed["results"], json!([]));
    }
}
