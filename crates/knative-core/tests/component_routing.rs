//! Component-level routing: endpoint resolution, request/reply and filters.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use chrono::Utc;
use async_trait::async_trait;
use knative_core::{
    processor_fn, Consumer, KnativeComponent, KnativeConfiguration, KnativeError, KnativeResult,
    MemoryTransport, Message, PhysicalEndpoint, Processor, Transport,
};
use knative_env::{
    Environment, PhysicalUri, Protocol, ServiceDefinition, ServiceType, FILTER_HEADER_NAME,
    FILTER_HEADER_VALUE, SERVICE_META_PATH, SERVICE_META_ZONE,
};

fn meta(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn endpoint_def(name: &str, host: &str, port: i32, metadata: &[(&str, &str)]) -> ServiceDefinition {
    ServiceDefinition::new(
        ServiceType::Endpoint,
        Protocol::Http,
        name,
        host,
        port,
        meta(metadata),
    )
}

fn component_with(
    services: Vec<ServiceDefinition>,
    configure: impl FnOnce(KnativeConfiguration) -> KnativeConfiguration,
) -> (KnativeComponent, MemoryTransport) {
    let transport = MemoryTransport::new();
    let conf =
        configure(KnativeConfiguration::default().with_environment(Environment::new(services)));
    (KnativeComponent::new(conf, Arc::new(transport.clone())), transport)
}

type Captured = Arc<Mutex<Vec<Message>>>;

fn capture() -> (Arc<dyn Processor>, Captured) {
    let seen: Captured = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let processor = processor_fn(move |m| {
        sink.lock().unwrap().push(m.clone());
        Ok(m)
    });
    (processor, seen)
}

/// Test: declared endpoint keeps host/port; URI sub-path overrides the metadata path
#[test]
fn test_create_endpoint() {
    let (component, _) = component_with(
        vec![endpoint_def("myEndpoint", "my-node", 9001, &[(SERVICE_META_PATH, "/a/path")])],
        |c| c,
    );

    let e1 = component.endpoint("knative:endpoint/myEndpoint").unwrap();
    assert_eq!(e1.service().name(), "myEndpoint");
    assert_eq!(e1.service().host(), "my-node");
    assert_eq!(e1.service().port(), 9001);
    assert_eq!(e1.physical_uri().path(), "/a/path");
    assert_eq!(e1.physical_uri().to_string(), "knative-http://my-node:9001/a/path");

    let e2 = component.endpoint("knative:endpoint/myEndpoint/another/path").unwrap();
    assert_eq!(e2.service().name(), "myEndpoint");
    assert_eq!(e2.physical_uri().host(), "my-node");
    assert_eq!(e2.physical_uri().port(), 9001);
    assert_eq!(e2.physical_uri().to_string(), "knative-http://my-node:9001/another/path");
}

/// Test: empty host is derived from the name, port defaults to 80
#[test]
fn test_create_endpoint_with_computed_host() {
    let (component, _) = component_with(
        vec![endpoint_def("myEndpoint", "", -1, &[(SERVICE_META_PATH, "/a/path")])],
        |c| c,
    );
    let e1 = component.endpoint("knative:endpoint/myEndpoint").unwrap();
    assert_eq!(e1.physical_uri().to_string(), "knative-http://myEndpoint:80/a/path");
}

/// Test: zone metadata qualifies the derived host
#[test]
fn test_create_endpoint_with_computed_host_and_namespace() {
    let (component, _) = component_with(
        vec![endpoint_def(
            "myEndpoint",
            "",
            -1,
            &[(SERVICE_META_PATH, "/a/path"), (SERVICE_META_ZONE, "myNamespace")],
        )],
        |c| c,
    );
    let e1 = component.endpoint("knative:endpoint/myEndpoint").unwrap();
    assert_eq!(
        e1.physical_uri().to_string(),
        "knative-http://myEndpoint.myNamespace:80/a/path"
    );
}

/// Test: zone placeholder is resolved from configured properties
#[test]
fn test_create_endpoint_with_computed_host_and_namespace_with_property() {
    let (component, _) = component_with(
        vec![endpoint_def(
            "myEndpoint",
            "",
            -1,
            &[(SERVICE_META_PATH, "/a/path"), (SERVICE_META_ZONE, "{{myNamespaceKey}}")],
        )],
        |mut c| {
            c.properties.insert("myNamespaceKey".into(), "myNamespace".into());
            c
        },
    );
    let e1 = component.endpoint("knative:endpoint/myEndpoint").unwrap();
    assert_eq!(
        e1.physical_uri().to_string(),
        "knative-http://myEndpoint.myNamespace:80/a/path"
    );
}

/// Test: unresolvable zone placeholder leaves the host unqualified
#[test]
fn test_unresolved_zone_placeholder_is_ignored() {
    let (component, _) = component_with(
        vec![endpoint_def("myEndpoint", "", -1, &[(SERVICE_META_ZONE, "{{missing}}")])],
        |c| c,
    );
    let e1 = component.endpoint("knative:endpoint/myEndpoint").unwrap();
    assert_eq!(e1.physical_uri().to_string(), "knative-http://myEndpoint:80/");
}

/// Test: undeclared endpoints and channels resolve to synthesized definitions
#[test]
fn test_create_endpoint_with_defaults() {
    let (component, _) = component_with(Vec::new(), |c| c);

    let e1 = component.endpoint("knative:endpoint/myEndpoint/my/path").unwrap();
    assert_eq!(e1.service().name(), "myEndpoint");
    assert_eq!(e1.service().kind(), ServiceType::Endpoint);
    assert_eq!(e1.physical_uri().to_string(), "knative-http://myEndpoint:80/my/path");

    let e2 = component.endpoint("knative:channel/myChannel/another/path").unwrap();
    assert_eq!(e2.service().name(), "myChannel-channel");
    assert_eq!(e2.service().kind(), ServiceType::Channel);
    assert_eq!(
        e2.physical_uri().to_string(),
        "knative-http://myChannel-channel:80/another/path"
    );
}

/// Test: unsupported protocol is rejected at construction
#[test]
fn test_unsupported_protocol_fails_construction() {
    let def = ServiceDefinition::new(
        ServiceType::Endpoint,
        Protocol::from("amqp".to_string()),
        "queue",
        "broker",
        5672,
        BTreeMap::new(),
    );
    let (component, _) = component_with(vec![def], |c| c);
    let err = component.endpoint("knative:endpoint/queue").unwrap_err();
    assert_eq!(err, KnativeError::Config("unsupported protocol: amqp".into()));
}

/// Test: mandatory lookup names the missing service exactly
#[test]
fn test_mandatory_lookup_of_unknown_service() {
    let (component, _) = component_with(Vec::new(), |c| c);
    let env = component.environment().unwrap();

    let err: KnativeError = env
        .mandatory_lookup(ServiceType::Endpoint, "unknown")
        .unwrap_err()
        .into();
    assert_eq!(
        err.to_string(),
        "Unable to find the service \"unknown\" with type \"endpoint\""
    );

    let err: KnativeError = env
        .mandatory_lookup(ServiceType::Channel, "unknown")
        .unwrap_err()
        .into();
    assert_eq!(
        err.to_string(),
        "Unable to find the service \"unknown\" with type \"channel\""
    );
}

/// Test: producer and consumer on one address; default event type
#[tokio::test]
async fn test_invoke_endpoint_with_default_event_type() {
    let (component, _) = component_with(
        vec![endpoint_def("myEndpoint", "localhost", 8081, &[(SERVICE_META_PATH, "/a/path")])],
        |c| c,
    );
    let endpoint = component.endpoint("knative:endpoint/myEndpoint").unwrap();
    let (sink, seen) = capture();

    component.start().await.unwrap();
    let consumer = endpoint.create_consumer(sink).unwrap();
    consumer.start().await.unwrap();

    endpoint
        .create_producer()
        .unwrap()
        .send(Message::new("test"))
        .await
        .unwrap();

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    let received = &seen[0];
    assert_eq!(received.header("CE-CloudEventsVersion"), Some("0.1"));
    assert_eq!(received.header("CE-EventType"), Some("org.apache.camel.event"));
    assert_eq!(received.header("CE-Source"), Some("knative://endpoint/myEndpoint"));
    assert!(received.has_header("CE-EventID"));
    assert!(received.has_header("CE-EventTime"));
    assert_eq!(received.body_str(), Some("test"));
}

/// Test: per-endpoint event type override reaches the consumer
#[tokio::test]
async fn test_invoke_endpoint_with_event_type_override() {
    let (component, _) = component_with(
        vec![endpoint_def("myEndpoint", "localhost", 8082, &[(SERVICE_META_PATH, "/a/path")])],
        |c| c,
    );
    let consumer_ep = component.endpoint("knative:endpoint/myEndpoint").unwrap();
    let producer_ep = component
        .endpoint("knative:endpoint/myEndpoint?cloudEventsType=my.type")
        .unwrap();
    let (sink, seen) = capture();

    component.start().await.unwrap();
    let consumer = consumer_ep.create_consumer(sink).unwrap();
    consumer.start().await.unwrap();

    producer_ep
        .create_producer()
        .unwrap()
        .send(Message::new("test"))
        .await
        .unwrap();

    let seen = seen.lock().unwrap();
    assert_eq!(seen[0].header("CE-EventType"), Some("my.type"));
    assert_eq!(
        seen[0].header("CE-Source"),
        Some("knative://endpoint/myEndpoint?cloudEventsType=my.type")
    );
}

/// Test: percent-encoded URI parameters reach the event decoded
#[tokio::test]
async fn test_encoded_event_type_is_decoded() {
    let (component, _) = component_with(vec![endpoint_def("ep", "localhost", 8089, &[])], |c| c);
    let consumer_ep = component.endpoint("knative:endpoint/ep").unwrap();
    let producer_ep = component
        .endpoint("knative:endpoint/ep?cloudEventsType=my%20type")
        .unwrap();
    let (sink, seen) = capture();

    component.start().await.unwrap();
    let consumer = consumer_ep.create_consumer(sink).unwrap();
    consumer.start().await.unwrap();
    producer_ep
        .create_producer()
        .unwrap()
        .send(Message::new("test"))
        .await
        .unwrap();

    let seen = seen.lock().unwrap();
    assert_eq!(seen[0].header("CE-EventType"), Some("my type"));
}

/// Test: structured producer is decoded back to headers by the consumer
#[tokio::test]
async fn test_structured_producer_binary_consumer() {
    let (component, _) = component_with(
        vec![endpoint_def("myEndpoint", "localhost", 8083, &[])],
        |c| c,
    );
    let consumer_ep = component.endpoint("knative:endpoint/myEndpoint").unwrap();
    let producer_ep = component
        .endpoint("knative:endpoint/myEndpoint?jsonSerializationEnabled=true")
        .unwrap();
    let (sink, seen) = capture();

    component.start().await.unwrap();
    let consumer = consumer_ep.create_consumer(sink).unwrap();
    consumer.start().await.unwrap();

    producer_ep
        .create_producer()
        .unwrap()
        .send(Message::new("test").with_header("Content-Type", "text/plain"))
        .await
        .unwrap();

    let seen = seen.lock().unwrap();
    assert_eq!(seen[0].header("CE-EventType"), Some("org.apache.camel.event"));
    assert_eq!(seen[0].content_type(), Some("text/plain"));
    assert_eq!(seen[0].body_str(), Some("test"));
}

/// Test: the producer receives the reply built by the consumer's pipeline
#[tokio::test]
async fn test_reply() {
    let (component, _) = component_with(
        vec![endpoint_def("from", "localhost", 8084, &[]), endpoint_def("to", "localhost", 8084, &[])],
        |c| c,
    );
    let from = component.endpoint("knative:endpoint/from").unwrap();
    let to = component.endpoint("knative:endpoint/to").unwrap();

    component.start().await.unwrap();
    let consumer = from
        .create_consumer(processor_fn(|mut m| {
            m.set_body("consumer");
            Ok(m.with_header("FromConsumer", "true"))
        }))
        .unwrap();
    consumer.start().await.unwrap();

    let reply = to.create_producer().unwrap().send(Message::new("test")).await.unwrap();
    assert_eq!(reply.header("FromConsumer"), Some("true"));
    assert_eq!(reply.body_str(), Some("consumer"));
}

/// Test: two logical consumers on one listener, selected by header filter
#[tokio::test]
async fn test_consume_content_with_filter() {
    let (component, transport) = component_with(
        vec![
            endpoint_def(
                "ep1",
                "localhost",
                8085,
                &[(FILTER_HEADER_NAME, "CE-Source"), (FILTER_HEADER_VALUE, "CE1")],
            ),
            endpoint_def(
                "ep2",
                "localhost",
                8085,
                &[(FILTER_HEADER_NAME, "CE-Source"), (FILTER_HEADER_VALUE, "CE2")],
            ),
        ],
        |c| c,
    );
    let ep1 = component.endpoint("knative:endpoint/ep1").unwrap();
    let ep2 = component.endpoint("knative:endpoint/ep2").unwrap();
    assert_eq!(
        ep1.physical_uri().to_string(),
        "knative-http://localhost:8085/?filter.CE-Source=CE1"
    );

    let (sink1, seen1) = capture();
    let (sink2, seen2) = capture();
    component.start().await.unwrap();
    let c1 = ep1.create_consumer(sink1).unwrap();
    let c2 = ep2.create_consumer(sink2).unwrap();
    c1.start().await.unwrap();
    c2.start().await.unwrap();

    let raw = transport
        .endpoint(&PhysicalUri::new(Protocol::Http, "localhost", 8085, "/", BTreeMap::new()))
        .unwrap();
    raw.start().await.unwrap();
    let sender = raw.create_producer().unwrap();

    for (id, source) in [("myEventID1", "CE1"), ("myEventID2", "CE2")] {
        let msg = Message::new("test")
            .with_header("CE-CloudEventsVersion", "0.1")
            .with_header("CE-EventType", "org.apache.camel.event")
            .with_header("CE-EventID", id)
            .with_header("CE-EventTime", Utc::now().to_rfc3339())
            .with_header("CE-Source", source);
        sender.process(msg).await.unwrap();
    }

    let seen1 = seen1.lock().unwrap();
    let seen2 = seen2.lock().unwrap();
    assert_eq!(seen1.len(), 1);
    assert_eq!(seen2.len(), 1);
    assert_eq!(seen1[0].header("CE-EventID"), Some("myEventID1"));
    assert_eq!(seen1[0].header("CE-Source"), Some("CE1"));
    assert_eq!(seen2[0].header("CE-EventID"), Some("myEventID2"));
    assert_eq!(seen2[0].header("CE-Source"), Some("CE2"));
    assert_eq!(seen2[0].body_str(), Some("test"));
}

/// Test: a consumer rejects a binary message missing envelope headers
#[tokio::test]
async fn test_decode_failure_propagates_to_sender() {
    let (component, transport) = component_with(
        vec![endpoint_def("ep", "localhost", 8086, &[])],
        |c| c,
    );
    let ep = component.endpoint("knative:endpoint/ep").unwrap();
    let (sink, seen) = capture();
    component.start().await.unwrap();
    let consumer = ep.create_consumer(sink).unwrap();
    consumer.start().await.unwrap();

    let raw = transport.endpoint(ep.physical_uri()).unwrap();
    raw.start().await.unwrap();
    let err = raw
        .create_producer()
        .unwrap()
        .process(Message::new("no envelope"))
        .await
        .unwrap_err();
    assert!(matches!(err, KnativeError::Parse(_)));
    assert!(seen.lock().unwrap().is_empty());
}

/// Test: sending before the endpoint is started is a transport error
#[tokio::test]
async fn test_send_requires_started_endpoint() {
    let (component, _) = component_with(vec![endpoint_def("ep", "localhost", 8087, &[])], |c| c);
    let ep = component.endpoint("knative:endpoint/ep").unwrap();
    let err = ep
        .create_producer()
        .unwrap()
        .send(Message::new("x"))
        .await
        .unwrap_err();
    assert!(matches!(err, KnativeError::Transport(_)));
}

/// Test: a stopped endpoint no longer consumes from a shared listener
#[tokio::test]
async fn test_stopped_endpoint_releases_consumers() {
    let (component, transport) = component_with(
        vec![endpoint_def("a", "localhost", 9000, &[]), endpoint_def("b", "localhost", 9000, &[])],
        |c| c,
    );
    let a = component.endpoint("knative:endpoint/a").unwrap();
    let b = component.endpoint("knative:endpoint/b").unwrap();
    component.start().await.unwrap();

    let consumer = a
        .create_consumer(processor_fn(|m| Ok(m.with_header("by", "a"))))
        .unwrap();
    consumer.start().await.unwrap();
    assert_eq!(transport.consumer_count(a.physical_uri()), 1);

    a.stop().await.unwrap();
    assert_eq!(transport.consumer_count(a.physical_uri()), 0);

    let err = b.create_producer().unwrap().send(Message::new("x")).await.unwrap_err();
    assert!(matches!(err, KnativeError::Transport(_)));
}

/// Memory transport whose endpoints on `failing_port` refuse to start.
struct FailingStart {
    inner: MemoryTransport,
    failing_port: u16,
}

impl Transport for FailingStart {
    fn endpoint(&self, uri: &PhysicalUri) -> KnativeResult<Arc<dyn PhysicalEndpoint>> {
        Ok(Arc::new(FailingEndpoint {
            inner: self.inner.endpoint(uri)?,
            fail: uri.port() == self.failing_port,
        }))
    }
}

struct FailingEndpoint {
    inner: Arc<dyn PhysicalEndpoint>,
    fail: bool,
}

#[async_trait]
impl PhysicalEndpoint for FailingEndpoint {
    fn uri(&self) -> &PhysicalUri {
        self.inner.uri()
    }

    async fn start(&self) -> KnativeResult<()> {
        if self.fail {
            return Err(KnativeError::Transport("boom".to_string()));
        }
        self.inner.start().await
    }

    async fn stop(&self) -> KnativeResult<()> {
        self.inner.stop().await
    }

    fn create_producer(&self) -> KnativeResult<Arc<dyn Processor>> {
        self.inner.create_producer()
    }

    fn create_consumer(&self, processor: Arc<dyn Processor>) -> KnativeResult<Box<dyn Consumer>> {
        self.inner.create_consumer(processor)
    }
}

/// Test: a failed component start stops the endpoints it already started
#[tokio::test]
async fn test_failed_start_releases_started_endpoints() {
    let memory = MemoryTransport::new();
    let transport = FailingStart {
        inner: memory.clone(),
        failing_port: 9102,
    };
    let conf = KnativeConfiguration::default().with_environment(Environment::new(vec![
        endpoint_def("a", "localhost", 9101, &[]),
        endpoint_def("b", "localhost", 9102, &[]),
        endpoint_def("c", "localhost", 9103, &[]),
    ]));
    let component = KnativeComponent::new(conf, Arc::new(transport));
    for name in ["a", "b", "c"] {
        component.endpoint(&format!("knative:endpoint/{name}")).unwrap();
    }

    let err = component.start().await.unwrap_err();
    assert_eq!(err, KnativeError::Transport("boom".to_string()));
    assert_eq!(memory.started_endpoints(), 0);
}
