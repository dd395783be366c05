// ── Control server ──
//
// Accepts TCP connections and speaks the line protocol. Each connection
// is served by its own task; requests on one connection are handled in
// order, while the master may run requests from different connections
// concurrently. `?halt` or the shutdown token stops the accept loop and
// deconfigures every product.

use std::net::SocketAddr;

use tokio::io::{AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use fbfuse_core::MasterController;

use crate::error::CliError;
use crate::protocol::{self, Action, REQUESTS};

pub struct ControlServer {
    master: MasterController,
    listener: TcpListener,
    shutdown: CancellationToken,
}

impl ControlServer {
    pub async fn bind(address: &str, master: MasterController) -> Result<Self, CliError> {
        let listener = TcpListener::bind(address)
            .await
            .map_err(|source| CliError::Bind {
                address: address.to_string(),
                source,
            })?;
        Ok(Self {
            master,
            listener,
            shutdown: CancellationToken::new(),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, CliError> {
        Ok(self.listener.local_addr()?)
    }

    /// Token that stops the server when cancelled.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Serve until halted, then shut the master down.
    pub async fn run(self) -> Result<(), CliError> {
        let mut connections = JoinSet::new();
        loop {
            tokio::select! {
                biased;
                () = self.shutdown.cancelled() => break,
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        debug!(%peer, "client connected");
                        connections.spawn(serve_connection(
                            self.master.clone(),
                            stream,
                            peer,
                            self.shutdown.clone(),
                        ));
                    }
                    Err(e) => warn!(error = %e, "accept failed"),
                },
            }
        }

        info!("control server stopping");
        connections.shutdown().await;
        self.master.shutdown().await;
        Ok(())
    }
}

async fn serve_connection(
    master: MasterController,
    stream: TcpStream,
    peer: SocketAddr,
    shutdown: CancellationToken,
) {
    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();

    loop {
        let line = tokio::select! {
            biased;
            () = shutdown.cancelled() => break,
            line = lines.next_line() => line,
        };
        let line = match line {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                warn!(%peer, error = %e, "read failed");
                break;
            }
        };

        let (replies, halt) = handle_line(&master, &line).await;
        if let Err(e) = write_lines(&mut writer, &replies).await {
            warn!(%peer, error = %e, "write failed");
            break;
        }
        if halt {
            info!(%peer, "halt requested");
            shutdown.cancel();
            break;
        }
    }
    debug!(%peer, "client disconnected");
}

/// Handle one input line. Returns the lines to send back and whether the
/// server should halt.
async fn handle_line(master: &MasterController, line: &str) -> (Vec<String>, bool) {
    let request = match protocol::parse_request(line) {
        Ok(Some(request)) => request,
        Ok(None) => return (Vec::new(), false),
        Err(e) => return (vec![protocol::fail("invalid", &e.to_string())], false),
    };
    let name = request.name.as_str();

    let action = match protocol::to_action(&request) {
        Ok(action) => action,
        Err(e) => return (vec![protocol::fail(name, &e.to_string())], false),
    };

    match action {
        Action::Execute(command) => {
            debug!(request = name, "executing");
            let result = master.execute(command).await;
            if let Err(ref e) = result {
                debug!(request = name, error = %e, "request failed");
            }
            (protocol::respond(name, result), false)
        }
        Action::Watchdog => (vec![protocol::ok(name, &[])], false),
        Action::Help => {
            let mut lines: Vec<String> = REQUESTS
                .iter()
                .map(|&(request, usage)| protocol::inform(name, &[request, usage]))
                .collect();
            lines.push(protocol::ok(name, &[&REQUESTS.len().to_string()]));
            (lines, false)
        }
        Action::Halt => (vec![protocol::ok(name, &[])], true),
    }
}

async fn write_lines<W>(writer: &mut W, lines: &[String]) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    for line in lines {
        writer.write_all(line.as_bytes()).await?;
        writer.write_all(b"\n").await?;
    }
    writer.flush().await
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use fbfuse_core::MasterConfig;
    use pretty_assertions::assert_eq;
    use tokio::io::Lines;
    use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};

    use super::*;

    const STREAMS: &str = r#"{"cam.http":{"camdata":"http://10.8.67.235/api/client/1"},"cbf.antenna_channelised_voltage":{"i0.antenna-channelised-voltage":"spead://239.2.1.150+15:7148"}}"#;

    struct Client {
        lines: Lines<BufReader<OwnedReadHalf>>,
        writer: OwnedWriteHalf,
    }

    impl Client {
        async fn connect(addr: SocketAddr) -> Self {
            let (reader, writer) = TcpStream::connect(addr).await.unwrap().into_split();
            Self {
                lines: BufReader::new(reader).lines(),
                writer,
            }
        }

        /// Send a request and collect everything up to its reply.
        async fn request(&mut self, line: &str) -> Vec<String> {
            self.writer
                .write_all(format!("{line}\n").as_bytes())
                .await
                .unwrap();
            let mut received = Vec::new();
            loop {
                let next = tokio::time::timeout(Duration::from_secs(5), self.lines.next_line())
                    .await
                    .unwrap()
                    .unwrap()
                    .unwrap();
                let done = next.starts_with('!');
                received.push(next);
                if done {
                    return received;
                }
            }
        }
    }

    async fn spawn_server() -> (SocketAddr, MasterController, tokio::task::JoinHandle<()>) {
        let master = MasterController::new(MasterConfig::dummy()).unwrap();
        master.start().await.unwrap();
        let server = ControlServer::bind("127.0.0.1:0", master.clone())
            .await
            .unwrap();
        let addr = server.local_addr().unwrap();
        let handle = tokio::spawn(async move { server.run().await.unwrap() });
        (addr, master, handle)
    }

    #[tokio::test]
    async fn configure_and_query_over_tcp() {
        let (addr, _master, _server) = spawn_server().await;
        let mut client = Client::connect(addr).await;

        let reply = client
            .request(&format!("?configure p0 m007,m008 4096 {STREAMS} FBFUSE_1"))
            .await;
        assert_eq!(reply, vec!["!configure ok"]);

        let reply = client.request("?sensor-value p0.state").await;
        assert_eq!(reply.len(), 2);
        assert!(reply[0].ends_with(" 1 p0.state nominal idle"), "{reply:?}");
        assert_eq!(reply[1], "!sensor-value ok 1");

        let reply = client.request("?configure p0 m007 4096 {} FBFUSE_1").await;
        assert_eq!(reply.len(), 1);
        assert!(reply[0].starts_with("!configure fail "));

        let reply = client.request("?capture-start missing").await;
        assert!(reply[0].starts_with("!capture-start fail Product\\_not\\_found"));
    }

    #[tokio::test]
    async fn worker_list_and_protocol_errors() {
        let (addr, _master, _server) = spawn_server().await;
        let mut client = Client::connect(addr).await;

        client.request("?register-worker-server 10.0.0.1 5000").await;
        client.request("?register-worker-server 10.0.0.2 5000").await;
        let reply = client.request("?worker-server-list").await;
        assert_eq!(
            reply,
            vec![
                "#worker-server-list 10.0.0.1:5000 free",
                "#worker-server-list 10.0.0.2:5000 free",
                "!worker-server-list ok 2",
            ]
        );

        let reply = client.request("?ping-workers").await;
        assert_eq!(reply.last().unwrap(), "!ping-workers ok 2");
        assert!(reply[0].ends_with(" ok"));

        let reply = client.request("?frobnicate").await;
        assert_eq!(reply, vec!["!frobnicate fail unknown\\_request\\_'frobnicate'"]);

        let reply = client.request("hello").await;
        assert_eq!(reply, vec!["!invalid fail requests\\_start\\_with\\_'?'"]);

        let reply = client.request("?watchdog").await;
        assert_eq!(reply, vec!["!watchdog ok"]);
    }

    #[tokio::test]
    async fn halt_stops_server_and_master() {
        let (addr, master, server) = spawn_server().await;
        let mut client = Client::connect(addr).await;

        client
            .request(&format!("?configure p0 m007,m008 4096 {STREAMS} FBFUSE_1"))
            .await;
        let reply = client.request("?halt").await;
        assert_eq!(reply, vec!["!halt ok"]);

        tokio::time::timeout(Duration::from_secs(5), server)
            .await
            .unwrap()
            .unwrap();
        assert!(!master.is_running());
        assert!(master.product_names().await.is_empty());
    }
}
