use super::{Behavior, Scripted, HOST_A, HOST_B};
use steadycall::{Coordinator, Endpoint, OutboundRequest};
use steadycall_core::{InvocationError, ServiceInstance, VERSION_METADATA_KEY};
use steadycall_loadbalancer::StaticDirectory;

/// A on 1.4, B on the 1.5 gray release.
fn gray_release() -> StaticDirectory {
    StaticDirectory::new().with_service(
        "orders",
        vec![
            ServiceInstance::new(HOST_A, 8080).with_metadata(VERSION_METADATA_KEY, "1.4"),
            ServiceInstance::new(HOST_B, 8080).with_metadata(VERSION_METADATA_KEY, "1.5"),
        ],
    )
}

async fn hosts_for(request: impl Fn() -> OutboundRequest<()>) -> Vec<String> {
    let transport = Scripted::new(Behavior::Status(200));
    let coordinator = Coordinator::builder("orders", gray_release()).build(transport.clone());
    for _ in 0..6 {
        coordinator.invoke(request()).await.unwrap();
    }
    transport.dispatched()
}

#[tokio::test(start_paused = true)]
async fn requested_version_pins_calls_to_matching_instances() {
    let hosts = hosts_for(|| {
        OutboundRequest::empty("orders", Endpoint::get("/orders")).with_version("1.5")
    })
    .await;
    assert!(hosts.iter().all(|host| host == HOST_B), "{hosts:?}");
}

#[tokio::test(start_paused = true)]
async fn unknown_version_uses_every_instance() {
    let hosts = hosts_for(|| {
        OutboundRequest::empty("orders", Endpoint::get("/orders")).with_version("2.0")
    })
    .await;
    assert!(hosts.iter().any(|host| host == HOST_A), "{hosts:?}");
    assert!(hosts.iter().any(|host| host == HOST_B), "{hosts:?}");
}

#[tokio::test(start_paused = true)]
async fn retries_stay_on_the_requested_version() {
    let transport = Scripted::new(Behavior::Status(200));
    transport.set(HOST_B, Behavior::Refused);
    let coordinator = Coordinator::builder("orders", gray_release()).build(transport.clone());

    let err = coordinator
        .invoke(OutboundRequest::empty("orders", Endpoint::get("/orders")).with_version("1.5"))
        .await
        .unwrap_err();

    assert!(matches!(err, InvocationError::ConnectFailure { .. }));
    assert!(transport.dispatched().iter().all(|host| host == HOST_B));
}
