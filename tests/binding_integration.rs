//! Binding integration tests — contract → classify → synthesize → invoke,
//! with payloads travelling through the marshaller cache the way a transport
//! would drive them.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use wirebind::binder::{bind, BoundService};
use wirebind::context::{CallContext, ServerContext};
use wirebind::contract::{
    downcast_arg_stream, MethodBody, MethodDecl, ParamRole, ReturnRole, ServiceContract,
};
use wirebind::dispatch::CanonicalCall;
use wirebind::marshal::json::JsonMarshallerFactory;
use wirebind::marshal::{ErasedMarshaller, MarshallerCache, MarshallerFactory};
use wirebind::payload::{downcast_payload, Empty, PayloadType, PayloadValue, Wrapped};
use wirebind::streams::{payload_channel, PayloadReader, PayloadWriter};
use wirebind::types::{BinderConfig, Error};

use futures::StreamExt;
use pretty_assertions::assert_eq;

struct Calculator {
    bias: i32,
}

fn config() -> BinderConfig {
    BinderConfig::new(vec![Arc::new(
        JsonMarshallerFactory::new()
            .with_type::<i32>()
            .with_type::<u32>()
            .with_type::<String>(),
    )])
}

fn calculator_contract() -> ServiceContract {
    let mut contract = ServiceContract::new("calculator.Calculator");

    // int DoubleIt(int x) — scalar in, scalar out, synchronous, no context.
    contract
        .add_method(MethodDecl::new(
            "DoubleIt",
            vec![ParamRole::scalar::<i32>()],
            ReturnRole::scalar::<i32>(),
            MethodBody::Sync(Box::new(|service, mut args| {
                let calc = service
                    .downcast_ref::<Calculator>()
                    .ok_or_else(|| Error::internal("wrong service instance"))?;
                let x = downcast_payload::<i32>(args.remove(0))?;
                Ok(Some(Box::new(x * 2 + calc.bias)))
            })),
        ))
        .unwrap();

    // Future<string> Describe(string name, CallContext ctx)
    contract
        .add_method(MethodDecl::new(
            "Describe",
            vec![ParamRole::message::<String>(), ParamRole::CallContext],
            ReturnRole::message::<String>(),
            MethodBody::Future(Box::new(|_, mut args| {
                Box::pin(async move {
                    let ctx = downcast_payload::<CallContext>(args.remove(1))?;
                    let name = downcast_payload::<String>(args.remove(0))?;
                    Ok(Some(
                        Box::new(format!("{name} via {}", ctx.method())) as PayloadValue
                    ))
                })
            })),
        ))
        .unwrap();

    // void Reset() — elided request and response.
    contract
        .add_method(MethodDecl::new(
            "Reset",
            vec![],
            ReturnRole::Empty,
            MethodBody::Sync(Box::new(|_, _| Ok(None))),
        ))
        .unwrap();

    contract
}

fn bound_calculator() -> BoundService {
    bind(calculator_contract(), &config()).unwrap()
}

fn ctx(method: &str) -> ServerContext {
    ServerContext::new("127.0.0.1:4242", method)
}

// Scenario 1: wrapped-int request {Value:5} yields wrapped-int response
// {Value:10}, with bytes travelling through the cache-resolved codec.
#[tokio::test]
async fn scalar_unary_round_trip_through_codec() {
    let config = config();
    let service = bound_calculator();
    let codec = config
        .marshallers()
        .get_or_create(&PayloadType::scalar::<i32>())
        .unwrap();

    // Transport side: decode the wire bytes into the carrier payload.
    let request = codec.deserialize(b"5").unwrap();
    let response = service
        .invoker("DoubleIt")
        .unwrap()
        .invoke(
            Arc::new(Calculator { bias: 0 }),
            CanonicalCall::unary(request, ctx("/calculator.Calculator/DoubleIt")),
        )
        .await
        .unwrap()
        .unwrap();

    // Transport side: encode the carrier back onto the wire.
    let bytes = codec.serialize(response).unwrap();
    assert_eq!(&bytes[..], b"10");
}

#[tokio::test]
async fn service_instance_reaches_the_body() {
    let service = bound_calculator();
    let out = service
        .invoker("DoubleIt")
        .unwrap()
        .invoke(
            Arc::new(Calculator { bias: 1 }),
            CanonicalCall::unary(Box::new(Wrapped(5i32)), ctx("/c/DoubleIt")),
        )
        .await
        .unwrap()
        .unwrap();
    assert_eq!(downcast_payload::<Wrapped<i32>>(out).unwrap(), Wrapped(11));
}

// Scenario 2: a unified context is constructed from the native context and
// appended as the last argument.
#[tokio::test]
async fn unified_context_is_constructed_and_appended() {
    let service = bound_calculator();
    let out = service
        .invoker("Describe")
        .unwrap()
        .invoke(
            Arc::new(Calculator { bias: 0 }),
            CanonicalCall::unary(
                Box::new("add".to_string()),
                ctx("/calculator.Calculator/Describe"),
            ),
        )
        .await
        .unwrap()
        .unwrap();
    assert_eq!(
        downcast_payload::<String>(out).unwrap(),
        "add via /calculator.Calculator/Describe"
    );
}

// Scenario 3: elided request and response; the canonical response is the
// empty sentinel and serializes to zero bytes.
#[tokio::test]
async fn elided_both_produces_empty_sentinel() {
    let config = config();
    let service = bound_calculator();
    let out = service
        .invoker("Reset")
        .unwrap()
        .invoke(
            Arc::new(Calculator { bias: 0 }),
            CanonicalCall::empty(ctx("/calculator.Calculator/Reset")),
        )
        .await
        .unwrap()
        .unwrap();

    let codec = config
        .marshallers()
        .get_or_create(&PayloadType::empty())
        .unwrap();
    assert_eq!(codec.serialize(out).unwrap().len(), 0);
    // The sentinel decodes back from nothing.
    downcast_payload::<Empty>(codec.deserialize(b"").unwrap()).unwrap();
}

// Scenario 4: cancelling mid-stream stops further writes and completes the
// call without NoMarshaller or ShapeMismatch.
#[tokio::test]
async fn server_stream_cancellation_stops_production() {
    let mut contract = ServiceContract::new("feed.Feed");
    contract
        .add_method(MethodDecl::new(
            "Chunks",
            vec![ParamRole::message::<u32>(), ParamRole::Cancellation],
            ReturnRole::stream_of::<u32>(),
            MethodBody::Stream(Box::new(|_, _| {
                // Unbounded production; only cancellation ends it.
                Box::pin(futures::stream::unfold(0u32, |n| async move {
                    tokio::time::sleep(Duration::from_millis(5)).await;
                    Some((Ok(Box::new(n) as PayloadValue), n + 1))
                }))
            })),
        ))
        .unwrap();
    let service = bind(contract, &config()).unwrap();

    let cancel = CancellationToken::new();
    let context = ctx("/feed.Feed/Chunks").with_cancellation(cancel.clone());
    let (writer, mut reader) = payload_channel(16);

    let invoker = service.invoker("Chunks").unwrap().clone();
    let call = tokio::spawn(async move {
        invoker
            .invoke(
                Arc::new(()),
                CanonicalCall::server_stream(Some(Box::new(3u32)), Box::new(writer), context),
            )
            .await
    });

    // Let a few chunks through, then cancel.
    let first = reader.next().await.unwrap().unwrap();
    assert_eq!(downcast_payload::<u32>(first).unwrap(), 0);
    cancel.cancel();

    let outcome = tokio::time::timeout(Duration::from_secs(2), call)
        .await
        .unwrap()
        .unwrap();
    match outcome {
        Err(Error::Cancelled(_)) | Ok(None) => {}
        other => panic!("unexpected completion: {other:?}"),
    }

    // Whatever was in flight drains, then the stream ends: no more writes.
    while let Some(item) = reader.next().await {
        item.unwrap();
    }
}

#[tokio::test]
async fn duplex_transforms_and_honours_one_token() {
    let mut contract = ServiceContract::new("feed.Feed");
    contract
        .add_method(MethodDecl::new(
            "Scale",
            vec![ParamRole::stream_of::<u32>()],
            ReturnRole::stream_of::<u32>(),
            MethodBody::Stream(Box::new(|_, mut args| {
                match downcast_arg_stream(args.remove(0)) {
                    Ok(input) => Box::pin(input.map(|item| {
                        let n = downcast_payload::<u32>(item?)?;
                        Ok(Box::new(n * 10) as PayloadValue)
                    })),
                    Err(e) => Box::pin(futures::stream::iter(vec![Err(e)])),
                }
            })),
        ))
        .unwrap();
    let service = bind(contract, &config()).unwrap();

    let (mut in_writer, in_reader) = payload_channel(4);
    let (out_writer, mut out_reader) = payload_channel(4);

    let invoker = service.invoker("Scale").unwrap().clone();
    let call = tokio::spawn(async move {
        invoker
            .invoke(
                Arc::new(()),
                CanonicalCall::duplex(
                    Box::new(in_reader),
                    Box::new(out_writer),
                    ctx("/feed.Feed/Scale"),
                ),
            )
            .await
    });

    in_writer.write(Box::new(1u32)).await.unwrap();
    in_writer.write(Box::new(2u32)).await.unwrap();
    drop(in_writer);

    let a = out_reader.next().await.unwrap().unwrap();
    let b = out_reader.next().await.unwrap().unwrap();
    assert_eq!(downcast_payload::<u32>(a).unwrap(), 10);
    assert_eq!(downcast_payload::<u32>(b).unwrap(), 20);

    assert!(call.await.unwrap().unwrap().is_none());
    assert!(out_reader.next().await.is_none());
}

// Scenario 5: a signature with two context-shaped trailing parameters is
// rejected when the contract is composed, not at first call.
#[test]
fn double_context_rejected_at_composition() {
    let mut contract = ServiceContract::new("broken.Service");
    contract
        .add_method(MethodDecl::new(
            "TwoContexts",
            vec![
                ParamRole::message::<String>(),
                ParamRole::CallContext,
                ParamRole::Cancellation,
            ],
            ReturnRole::Empty,
            MethodBody::Sync(Box::new(|_, _| Ok(None))),
        ))
        .unwrap();

    let err = bind(contract, &config()).unwrap_err();
    assert!(matches!(err, Error::UnsupportedSignature { .. }));
}

// Scenario 6: with a higher-priority real-message factory in front, its
// codec is the one cached even when a lower-priority factory also claims
// the type.
#[test]
fn higher_priority_factory_wins_the_cache() {
    struct StubFactory;
    struct StubMarshaller;

    impl ErasedMarshaller for StubMarshaller {
        fn payload_type(&self) -> PayloadType {
            PayloadType::message::<String>()
        }
        fn serialize(&self, _: PayloadValue) -> wirebind::Result<bytes::Bytes> {
            Ok(bytes::Bytes::from_static(b"stub"))
        }
        fn deserialize(&self, _: &[u8]) -> wirebind::Result<PayloadValue> {
            Ok(Box::new("stub".to_string()))
        }
    }

    impl MarshallerFactory for StubFactory {
        fn can_serialize(&self, ty: &PayloadType) -> bool {
            ty.id() == std::any::TypeId::of::<String>()
        }
        fn create(&self, _: &PayloadType) -> wirebind::Result<Arc<dyn ErasedMarshaller>> {
            Ok(Arc::new(StubMarshaller))
        }
        fn as_any(&self) -> &dyn std::any::Any {
            self
        }
    }

    let json: Arc<dyn MarshallerFactory> =
        Arc::new(JsonMarshallerFactory::new().with_type::<String>());
    let stub: Arc<dyn MarshallerFactory> = Arc::new(StubFactory);

    // JSON first: its codec is cached.
    let cache = MarshallerCache::new(vec![json.clone(), stub.clone()]);
    let codec = cache
        .get_or_create(&PayloadType::message::<String>())
        .unwrap();
    assert_eq!(
        &codec.serialize(Box::new("x".to_string())).unwrap()[..],
        b"\"x\""
    );

    // Stub first: the stub codec is cached instead.
    let cache = MarshallerCache::new(vec![stub, json]);
    let codec = cache
        .get_or_create(&PayloadType::message::<String>())
        .unwrap();
    assert_eq!(
        &codec.serialize(Box::new("x".to_string())).unwrap()[..],
        b"stub"
    );
}

// Client streaming end to end: the intake sequence feeds the body, the
// single response comes back through completion normalization.
#[tokio::test]
async fn client_stream_totals_its_intake() {
    let mut contract = ServiceContract::new("feed.Feed");
    contract
        .add_method(MethodDecl::new(
            "Total",
            vec![ParamRole::stream_of::<u32>(), ParamRole::CallContext],
            ReturnRole::message::<u32>(),
            MethodBody::Future(Box::new(|_, mut args| {
                Box::pin(async move {
                    let _ctx = downcast_payload::<CallContext>(args.remove(1))?;
                    let mut input = downcast_arg_stream(args.remove(0))?;
                    let mut total = 0u32;
                    while let Some(item) = input.next().await {
                        total += downcast_payload::<u32>(item?)?;
                    }
                    Ok(Some(Box::new(total) as PayloadValue))
                })
            })),
        ))
        .unwrap();
    let service = bind(contract, &config()).unwrap();

    let (mut writer, reader) = payload_channel(4);
    for n in [1u32, 2, 3, 4] {
        writer.write(Box::new(n)).await.unwrap();
    }
    drop(writer);

    let out = service
        .invoker("Total")
        .unwrap()
        .invoke(
            Arc::new(()),
            CanonicalCall::client_stream(Box::new(reader), ctx("/feed.Feed/Total")),
        )
        .await
        .unwrap()
        .unwrap();
    assert_eq!(downcast_payload::<u32>(out).unwrap(), 10);
}
