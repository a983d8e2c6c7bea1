use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncReadExt;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tracing::debug;

use super::ClientError;
use super::MatrixClient;
use crate::config::MatrixConfig;
use crate::engine::MatrixState;

/// Quiet period after which a reply is considered complete
const REPLY_QUIET: Duration = Duration::from_millis(300);

/// Reply fragments the matrix uses to refuse a command
const REJECTIONS: [&str; 3] = ["error", "invalid", "unknown"];

/// Matrix client speaking the device's ASCII control commands over TCP.
///
/// Opens one connection per exchange. The device does not frame its replies,
/// so a reply ends when the connection goes quiet or closes.
pub struct TcpMatrixClient {
    addr: String,
    timeout: Duration,
}

impl TcpMatrixClient {
    pub fn new(config: &MatrixConfig) -> Self {
        Self {
            addr: format!("{}:{}", config.host, config.port),
            timeout: Duration::from_secs(config.command_timeout_secs),
        }
    }

    /// Send one command and collect whatever the device answers
    async fn exchange(&self, command: &str) -> Result<String, ClientError> {
        let exchange = async {
            let mut stream = TcpStream::connect(&self.addr).await?;
            stream.write_all(command.as_bytes()).await?;
            stream.flush().await?;

            let mut reply = Vec::new();
            let mut buf = [0u8; 512];
            loop {
                match tokio::time::timeout(REPLY_QUIET, stream.read(&mut buf)).await {
                    Ok(Ok(0)) | Err(_) => break,
                    Ok(Ok(n)) => reply.extend_from_slice(&buf[..n]),
                    Ok(Err(e)) => return Err(ClientError::Io(e)),
                }
            }

            Ok::<_, ClientError>(String::from_utf8_lossy(&reply).into_owned())
        };

        let reply = tokio::time::timeout(self.timeout, exchange)
            .await
            .map_err(|_| ClientError::Timeout(command.to_string()))??;

        debug!("{} -> {:?}", command, reply);
        Ok(reply)
    }
}

#[async_trait]
impl MatrixClient for TcpMatrixClient {
    async fn set_output_source(&self, input: u8, output: u8) -> Result<(), ClientError> {
        let reply = self
            .exchange(&format!("s in {} av out {}!", input, output))
            .await?;
        check_ack(&reply)
    }

    async fn query_state(&self) -> Result<MatrixState, ClientError> {
        let power = parse_power(&self.exchange("r power!").await?)?;
        let model_name = parse_model(&self.exchange("r type!").await?);

        // The matrix does not report routing while in standby
        let routing = if power {
            parse_routing(&self.exchange("r av out 0!").await?)
        } else {
            BTreeMap::new()
        };

        Ok(MatrixState {
            power,
            model_name,
            routing,
            ..Default::default()
        })
    }
}

/// A set command is accepted unless the reply says otherwise. Some firmware
/// answers nothing at all, which counts as accepted.
fn check_ack(reply: &str) -> Result<(), ClientError> {
    let reply_lower = reply.to_lowercase();
    if REJECTIONS.iter().any(|word| reply_lower.contains(word)) {
        return Err(ClientError::UnexpectedReply(reply.trim().to_string()));
    }
    Ok(())
}

/// Parse a `power on` / `power off` reply
fn parse_power(reply: &str) -> Result<bool, ClientError> {
    let reply_lower = reply.to_lowercase();
    if reply_lower.contains("power on") {
        Ok(true)
    } else if reply_lower.contains("power off") {
        Ok(false)
    } else {
        Err(ClientError::UnexpectedReply(reply.trim().to_string()))
    }
}

/// The model is the first non-empty line of the `r type!` reply
fn parse_model(reply: &str) -> String {
    reply
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .unwrap_or_default()
        .to_string()
}

/// Parse lines like `input 3 -> output 1` into output -> input
fn parse_routing(reply: &str) -> BTreeMap<u8, u8> {
    let mut routing = BTreeMap::new();

    for line in reply.lines() {
        let line = line.to_lowercase();
        let mut input = None;
        let mut output = None;

        let mut tokens = line.split_whitespace();
        while let Some(token) = tokens.next() {
            let slot = match token {
                "input" | "in" => &mut input,
                "output" | "out" => &mut output,
                _ => continue,
            };
            *slot = tokens.next().and_then(|n| n.trim_end_matches([':', ',', '!']).parse().ok());
        }

        if let (Some(input), Some(output)) = (input, output) {
            routing.insert(output, input);
        }
    }

    routing
}

#[cfg(test)]
mod tests {
    use tokio::io::AsyncBufReadExt;
    use tokio::io::BufReader;
    use tokio::net::TcpListener;

    use super::*;

    #[test]
    fn test_parse_power() {
        assert!(parse_power("power on\r\n").unwrap());
        assert!(!parse_power("Power OFF").unwrap());
        assert!(matches!(
            parse_power("command error"),
            Err(ClientError::UnexpectedReply(_))
        ));
    }

    #[test]
    fn test_check_ack() {
        assert!(check_ack("").is_ok());
        assert!(check_ack("input 2 -> output 4\r\n").is_ok());
        assert!(matches!(
            check_ack("Command Error\r\n"),
            Err(ClientError::UnexpectedReply(reply)) if reply == "Command Error"
        ));
        assert!(check_ack("invalid port").is_err());
    }

    #[test]
    fn test_parse_model() {
        assert_eq!(parse_model("\r\nHDP-MXB88\r\n"), "HDP-MXB88");
        assert_eq!(parse_model(""), "");
    }

    #[test]
    fn test_parse_routing() {
        let reply = "input 2 -> output 1\r\ninput 1 -> output 2\r\ngarbage\r\ninput 4 -> output 3\r\n";
        let routing = parse_routing(reply);
        assert_eq!(routing.len(), 3);
        assert_eq!(routing.get(&1), Some(&2));
        assert_eq!(routing.get(&2), Some(&1));
        assert_eq!(routing.get(&3), Some(&4));
    }

    /// Minimal fake matrix answering canned replies, one command per connection
    async fn spawn_fake_matrix() -> (String, tokio::sync::mpsc::UnboundedReceiver<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();

        tokio::spawn(async move {
            loop {
                let (stream, _) = listener.accept().await.unwrap();
                let tx = tx.clone();
                tokio::spawn(async move {
                    let (read, mut write) = stream.into_split();
                    let mut reader = BufReader::new(read);
                    let mut command = Vec::new();
                    reader.read_until(b'!', &mut command).await.unwrap();
                    let command = String::from_utf8(command).unwrap();
                    let reply = match command.as_str() {
                        "r power!" => "power on\r\n",
                        "r type!" => "HDP-MXB44\r\n",
                        "r av out 0!" => "input 3 -> output 1\r\ninput 1 -> output 2\r\n",
                        // Pretend the matrix only has inputs 1 to 8
                        c if c.starts_with("s in 9 ") => "Command Error\r\n",
                        _ => "ok\r\n",
                    };
                    tx.send(command).unwrap();
                    write.write_all(reply.as_bytes()).await.unwrap();
                });
            }
        });

        (addr.to_string(), rx)
    }

    fn client_for(addr: &str) -> TcpMatrixClient {
        let (host, port) = addr.rsplit_once(':').unwrap();
        let mut config = MatrixConfig::new(host);
        config.port = port.parse().unwrap();
        config.command_timeout_secs = 2;
        TcpMatrixClient::new(&config)
    }

    #[tokio::test]
    async fn test_query_state_against_fake_matrix() {
        let (addr, _rx) = spawn_fake_matrix().await;
        let client = client_for(&addr);

        let state = client.query_state().await.unwrap();
        assert!(state.power);
        assert_eq!(state.model_name, "HDP-MXB44");
        assert_eq!(state.routing.get(&1), Some(&3));
        assert_eq!(state.routing.get(&2), Some(&1));
    }

    #[tokio::test]
    async fn test_set_output_source_sends_command() {
        let (addr, mut rx) = spawn_fake_matrix().await;
        let client = client_for(&addr);

        client.set_output_source(2, 4).await.unwrap();
        assert_eq!(rx.recv().await.unwrap(), "s in 2 av out 4!");
    }

    #[tokio::test]
    async fn test_set_output_source_refused_by_matrix() {
        let (addr, mut rx) = spawn_fake_matrix().await;
        let client = client_for(&addr);

        let err = client.set_output_source(9, 1).await.unwrap_err();
        assert!(matches!(err, ClientError::UnexpectedReply(_)));
        assert_eq!(rx.recv().await.unwrap(), "s in 9 av out 1!");
    }

    #[tokio::test]
    async fn test_connection_refused_is_io_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        drop(listener);

        let client = client_for(&addr);
        let err = client.set_output_source(1, 1).await.unwrap_err();
        assert!(matches!(err, ClientError::Io(_)));
    }
}
