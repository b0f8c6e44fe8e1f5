use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempo::{MetricError, StatsdClient};
use tokio::net::UdpSocket;

pub const NUM_TASKS: u64 = 10;
pub const NUM_ITERATIONS: u64 = 1_000;

#[allow(dead_code)]
pub fn init_logging() {
    pretty_env_logger::try_init().ok();
}

/// Error handler that keeps every error it's given.
#[allow(dead_code)]
#[derive(Debug, Clone, Default)]
pub struct Recorder {
    errors: Arc<Mutex<Vec<MetricError>>>,
}

#[allow(dead_code)]
impl Recorder {
    pub fn handler(&self) -> impl Fn(MetricError) + Sync + Send + std::panic::RefUnwindSafe + 'static {
        let errors = self.errors.clone();
        move |e| errors.lock().unwrap().push(e)
    }

    pub fn errors(&self) -> Vec<MetricError> {
        self.errors.lock().unwrap().clone()
    }
}

/// Bind a UDP socket on localhost that a client can send to.
#[allow(dead_code)]
pub async fn udp_server() -> (UdpSocket, u16) {
    let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let port = socket.local_addr().unwrap().port();
    (socket, port)
}

#[allow(dead_code)]
pub async fn recv_datagram(socket: &UdpSocket) -> String {
    let mut buf = vec![0u8; 65_536];
    let n = tokio::time::timeout(Duration::from_secs(5), socket.recv(&mut buf))
        .await
        .expect("timed out waiting for a datagram")
        .unwrap();
    String::from_utf8(buf[..n].to_vec()).unwrap()
}

/// Emit every kind of metric from several tasks at once.
#[allow(dead_code)]
pub async fn run_concurrent_test(client: StatsdClient, num_tasks: u64, iterations: u64) {
    let tasks: Vec<_> = (0..num_tasks)
        .map(|_| {
            let local_client = client.clone();

            tokio::spawn(async move {
                for i in 0..iterations {
                    local_client.count("some.counter", i as i64).unwrap();
                    local_client.timing("some.timer", i).unwrap();
                    local_client.gauge("some.gauge", i).unwrap();
                    local_client.gauge("some.gauge", i as f64).unwrap();
                    local_client.histogram("some.histogram", i).unwrap();
                    local_client.distribution("some.distribution", i).unwrap();
                    local_client.set("some.set", i as i64).unwrap();
                    tokio::task::yield_now().await;
                }
            })
        })
        .collect();

    for t in tasks {
        t.await.unwrap();
    }
}
