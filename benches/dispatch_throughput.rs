//! Invoker dispatch benchmark.
//!
//! Measures adapted-call overhead (unpack, context injection, completion
//! normalization, response wrapping) against the synthesized invokers, plus
//! marshaller cache hit latency, using Criterion.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use std::sync::Arc;

use wirebind::contract::{MethodBody, MethodDecl, ParamRole, ReturnRole, ServiceContract};
use wirebind::dispatch::CanonicalCall;
use wirebind::marshal::json::JsonMarshallerFactory;
use wirebind::payload::{downcast_payload, ArgList, PayloadType, PayloadValue, Wrapped};
use wirebind::types::BinderConfig;

fn config() -> BinderConfig {
    BinderConfig::new(vec![Arc::new(
        JsonMarshallerFactory::new().with_type::<i32>().with_type::<String>(),
    )])
}

fn bench_unary_invoke(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();

    let mut contract = ServiceContract::new("bench.Service");
    contract
        .add_method(MethodDecl::new(
            "DoubleIt",
            vec![ParamRole::scalar::<i32>()],
            ReturnRole::scalar::<i32>(),
            MethodBody::Sync(Box::new(|_, mut args| {
                let x = downcast_payload::<i32>(args.remove(0))?;
                Ok(Some(Box::new(x * 2)))
            })),
        ))
        .unwrap();
    let service = wirebind::binder::bind(contract, &config()).unwrap();
    let invoker = service.invoker("DoubleIt").unwrap().clone();

    c.bench_function("unary_scalar_invoke", |b| {
        b.iter(|| {
            rt.block_on(async {
                let ctx = wirebind::context::ServerContext::new("bench", "/bench/DoubleIt");
                invoker
                    .invoke(
                        Arc::new(()),
                        CanonicalCall::unary(black_box(Box::new(Wrapped(21i32))), ctx),
                    )
                    .await
                    .unwrap()
            })
        });
    });
}

fn bench_multi_arg_invoke(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();

    let mut contract = ServiceContract::new("bench.Service");
    contract
        .add_method(MethodDecl::new(
            "Sum",
            vec![
                ParamRole::message::<String>(),
                ParamRole::scalar::<i32>(),
                ParamRole::scalar::<i32>(),
            ],
            ReturnRole::scalar::<i32>(),
            MethodBody::Sync(Box::new(|_, mut args| {
                let b = downcast_payload::<i32>(args.remove(2))?;
                let a = downcast_payload::<i32>(args.remove(1))?;
                Ok(Some(Box::new(a + b)))
            })),
        ))
        .unwrap();
    let service = wirebind::binder::bind(contract, &config()).unwrap();
    let invoker = service.invoker("Sum").unwrap().clone();

    c.bench_function("multi_arg_invoke", |b| {
        b.iter(|| {
            rt.block_on(async {
                let list = ArgList::new(vec![
                    Box::new("sum".to_string()) as PayloadValue,
                    Box::new(Wrapped(2i32)),
                    Box::new(Wrapped(3i32)),
                ]);
                let ctx = wirebind::context::ServerContext::new("bench", "/bench/Sum");
                invoker
                    .invoke(Arc::new(()), CanonicalCall::unary(Box::new(list), ctx))
                    .await
                    .unwrap()
            })
        });
    });
}

fn bench_marshaller_cache_hit(c: &mut Criterion) {
    let config = config();
    let ty = PayloadType::scalar::<i32>();
    // Prime the cache so the loop measures hits only.
    config.marshallers().get_or_create(&ty).unwrap();

    c.bench_function("marshaller_cache_hit", |b| {
        b.iter(|| config.marshallers().get_or_create(black_box(&ty)).unwrap());
    });
}

criterion_group!(
    benches,
    bench_unary_invoke,
    bench_multi_arg_invoke,
    bench_marshaller_cache_hit
);
criterion_main!(benches);
