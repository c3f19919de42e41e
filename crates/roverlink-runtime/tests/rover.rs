//! The assembled rover over loopback: sampler feeds both servers.

use std::time::Duration;

use roverlink_hal::{BUILTIN_LED, STATUS_LIGHT, SimImu, SimRegistry};
use roverlink_rpc::FrameKind;
use roverlink_rpc::codec::decode_frame;
use roverlink_runtime::{Rover, RoverSettings};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio::time::timeout;

const WAIT: Duration = Duration::from_secs(5);

#[tokio::test]
async fn sampled_telemetry_reaches_rpc_and_mirror() {
    let hardware = SimRegistry::new().with_builtin_led().with_status_light().build();
    let settings = RoverSettings {
        sample_period: Duration::from_millis(2),
        stream_poll: Duration::from_millis(1),
        ..RoverSettings::default()
    };
    let rover = Rover::new(hardware, settings);
    let bridge = std::sync::Arc::clone(rover.bridge());
    let hardware = std::sync::Arc::clone(rover.hardware());

    let rpc_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let rpc_addr = rpc_listener.local_addr().unwrap();
    let http_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let http_addr = http_listener.local_addr().unwrap();

    let (stop, shutdown) = watch::channel(false);
    let task = tokio::spawn(rover.serve(
        Box::new(SimImu::new("sim-imu")),
        rpc_listener,
        Some(http_listener),
        shutdown,
    ));

    timeout(WAIT, async {
        while bridge.samples_published() < 10 {
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
    })
    .await
    .expect("sampler running");
    assert!(hardware.indicator_state(STATUS_LIGHT).is_some());

    // RPC side.
    let stream = TcpStream::connect(rpc_addr).await.unwrap();
    let (rx, mut tx) = stream.into_split();
    let mut lines = BufReader::new(rx).lines();
    tx.write_all(b"GetSpecificImuData:accz\n").await.unwrap();
    let line = timeout(WAIT, lines.next_line()).await.unwrap().unwrap().unwrap();
    let frame = decode_frame(&line).unwrap();
    assert_eq!(frame.kind, FrameKind::Response);
    let body = frame.json().unwrap();
    let acc_z = body["acc_z"].as_f64().unwrap();
    assert!(acc_z > 5.0 && acc_z < 15.0, "simulated gravity, got {acc_z}");

    tx.write_all(b"TurnLedOn\n").await.unwrap();
    timeout(WAIT, lines.next_line()).await.unwrap().unwrap().unwrap();
    assert_eq!(hardware.indicator_state(BUILTIN_LED), Some(true));

    // Mirror side.
    let mut http = TcpStream::connect(http_addr).await.unwrap();
    http.write_all(b"GET /all-imu-data HTTP/1.1\r\nHost: rover\r\nConnection: close\r\n\r\n")
        .await
        .unwrap();
    let mut reply = String::new();
    timeout(WAIT, http.read_to_string(&mut reply)).await.unwrap().unwrap();
    assert!(reply.starts_with("HTTP/1.1 200 OK"));
    let json = reply.split("\r\n\r\n").nth(1).unwrap();
    let doc: serde_json::Value = serde_json::from_str(json).unwrap();
    assert!(doc["accZ"].as_f64().unwrap() > 5.0);

    drop(tx);
    stop.send(true).unwrap();
    timeout(WAIT, task).await.unwrap().unwrap();
}

#[tokio::test]
async fn run_fails_when_rpc_port_is_taken() {
    let taken = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let settings = RoverSettings {
        bind_address: "127.0.0.1".parse().unwrap(),
        rpc_port: taken.local_addr().unwrap().port(),
        http_mirror: false,
        ..RoverSettings::default()
    };
    let rover = Rover::new(SimRegistry::new().build(), settings);
    let (_stop, shutdown) = watch::channel(false);
    let result = timeout(
        Duration::from_secs(30),
        rover.run(Box::new(SimImu::new("sim-imu")), shutdown),
    )
    .await
    .unwrap();
    assert!(result.is_err());
}
