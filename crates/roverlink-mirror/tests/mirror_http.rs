//! HTTP mirror over loopback TCP.

use std::sync::Arc;
use std::time::Duration;

use roverlink_bridge::TelemetryBridge;
use roverlink_hal::{BUILTIN_LED, SimRegistry};
use roverlink_mirror::{MirrorServer, MirrorState};
use roverlink_types::TelemetrySample;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio::time::timeout;

async fn get(addr: std::net::SocketAddr, target: &str) -> String {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    let request = format!("GET {target} HTTP/1.1\r\nHost: rover\r\nConnection: close\r\n\r\n");
    stream.write_all(request.as_bytes()).await.unwrap();
    let mut reply = String::new();
    timeout(Duration::from_secs(5), stream.read_to_string(&mut reply))
        .await
        .unwrap()
        .unwrap();
    reply
}

#[tokio::test]
async fn serves_routes_until_shutdown() {
    let bridge = Arc::new(TelemetryBridge::new());
    bridge.publish_sample(TelemetrySample {
        acc_x: 0.5,
        temperature: 21.5,
        ..TelemetrySample::default()
    });
    let hardware = Arc::new(SimRegistry::new().with_builtin_led().build());
    let state = MirrorState::new(Arc::clone(&bridge), Arc::clone(&hardware));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (stop, shutdown) = watch::channel(false);
    let server = tokio::spawn(MirrorServer::new(state).serve(listener, shutdown));

    let reply = get(addr, "/").await;
    assert!(reply.starts_with("HTTP/1.1 200 OK\r\n"));
    assert!(reply.ends_with("\r\n\r\nhello from rover!"));

    let reply = get(addr, "/led-on").await;
    assert!(reply.ends_with("Ok"));
    assert_eq!(hardware.indicator_state(BUILTIN_LED), Some(true));

    let reply = get(addr, "/specific-imu-data?parameter=accx").await;
    assert!(reply.to_ascii_lowercase().contains("content-type: application/json"));
    assert!(reply.ends_with(r#"{"accX":0.5}"#));

    let reply = get(addr, "/specific-imu-data?parameter=%74emperature").await;
    assert!(reply.ends_with(r#"{"temperature":21.5}"#));

    let reply = get(addr, "/specific-imu-data?parameter=warp").await;
    assert!(reply.starts_with("HTTP/1.1 400 Bad Request\r\n"));

    let reply = get(addr, "/nowhere").await;
    assert!(reply.starts_with("HTTP/1.1 404 Not Found\r\n"));
    assert!(reply.ends_with("File Not Found"));

    stop.send(true).unwrap();
    timeout(Duration::from_secs(5), server).await.unwrap().unwrap();
}
