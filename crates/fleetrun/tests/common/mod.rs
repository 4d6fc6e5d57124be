//! Shared fixtures: a test service bound on one node and a client node wired to it.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::AtomicI32;
use std::sync::atomic::Ordering;

use fleetrun::Args;
use fleetrun::Fault;
use fleetrun::Handler;
use fleetrun::MemoryChannel;
use fleetrun::NetworkChannel;
use fleetrun::ObjectRef;
use fleetrun::Returned;
use fleetrun::RpcConfig;
use fleetrun::RpcNode;
use fleetrun::TypeDef;
use fleetrun::math;
use fleetrpc::RemoteType;
use fleetrpc::TypeDesc;
use fleetrpc::Value;

pub const SERVICE: &str = "testService";
pub const CHAIN_TARGET: &str = "chainTarget";

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub struct TestService {
    pub calls: AtomicI32,
}

pub struct ChainTarget {
    counter: i32,
}

/// Stands for a remote `chainTarget` in typed signatures.
pub struct ChainTargetRef;

impl RemoteType for ChainTargetRef {
    fn type_desc() -> TypeDesc {
        TypeDesc::object(CHAIN_TARGET)
    }
}

pub fn chain_target_def() -> Arc<TypeDef> {
    TypeDef::builder::<ChainTarget>(CHAIN_TARGET)
        .method("addToCounter", "(F)D", |t: &ChainTarget, args: Args<'_>| {
            let amount: f32 = args.get(0)?;
            Ok(Value::Double(f64::from(t.counter) + f64::from(amount)).into())
        })
        .method("printCounter", "(CT)T", |t: &ChainTarget, args: Args<'_>| {
            let prefix: char = args.get(0)?;
            let suffix: Option<String> = args.get(1)?;
            let suffix = suffix.as_deref().unwrap_or("null");
            Ok(Value::from(format!("{prefix}{}{suffix}", t.counter)).into())
        })
        .snapshot(|t: &ChainTarget| {
            Value::Record(BTreeMap::from([("counter".to_string(), Value::Int(t.counter))]))
        })
        .build()
        .unwrap()
}

pub fn service_def(chain_target: Arc<TypeDef>) -> Arc<TypeDef> {
    TypeDef::builder::<TestService>(SERVICE)
        .method("helloWorld", "(I)T", |s: &TestService, args: Args<'_>| {
            s.calls.fetch_add(1, Ordering::SeqCst);
            let n: i32 = args.get(0)?;
            Ok(Value::from(format!("Hello World, for the {n}. time!")).into())
        })
        .method("round", "(D)J", |_: &TestService, args: Args<'_>| {
            let v: f64 = args.get(0)?;
            Ok(Value::Long((v + 0.5).floor() as i64).into())
        })
        .method("sum", "(JJ)J", |_: &TestService, args: Args<'_>| {
            Ok(Value::Long(math::add_exact(args.get(0)?, args.get(1)?)?).into())
        })
        .method("increment", "(I)V", |s: &TestService, args: Args<'_>| {
            let by: i32 = args.get(0)?;
            s.calls.fetch_add(by, Ordering::SeqCst);
            Ok(Returned::null())
        })
        .method("chainedTest", "(I)LchainTarget;", {
            let def = chain_target.clone();
            move |_: &TestService, args: Args<'_>| {
                let seed = math::add_exact_int(args.get(0)?, 5)?;
                Ok(ObjectRef::new(ChainTarget { counter: seed }, def.clone()).into())
            }
        })
        .method("nothing", "()LchainTarget;", |_: &TestService, _| Ok(Returned::null()))
        .method("fail", "(T)V", |_: &TestService, args: Args<'_>| {
            let reason: String = args.get(0)?;
            Err(Fault::illegal_state(reason))
        })
        .method("internal", "()V", |_: &TestService, _| Ok(Returned::null()))
        .ignore("internal")
        .static_method("version", "()I", |_| Ok(Value::Int(4).into()))
        .build()
        .unwrap()
}

pub struct Fixture {
    pub server: Arc<RpcNode>,
    pub client: Arc<RpcNode>,
    pub service: Arc<TestService>,
    /// The client's end of the link.
    pub channel: Arc<dyn NetworkChannel>,
    pub service_def: Arc<TypeDef>,
    pub chain_target_def: Arc<TypeDef>,
}

/// Two nodes over an in-process link, with the test service bound on the server
/// and the chain target reachable but unbound.
pub fn connected() -> Fixture {
    init_tracing();
    let config = RpcConfig::default();
    let server = Arc::new(RpcNode::new(config.clone()));
    let client = Arc::new(RpcNode::new(config));

    let chain_target_def = chain_target_def();
    let service_def = service_def(chain_target_def.clone());
    let service = Arc::new(TestService { calls: AtomicI32::new(0) });
    server.register(Handler::builder(service_def.clone()).shared(service.clone()).build());
    server.register(Handler::builder(chain_target_def.clone()).build());

    let (client_end, client_inbox, server_end, server_inbox) = MemoryChannel::pair();
    let client_end: Arc<dyn NetworkChannel> = Arc::new(client_end);
    let server_end: Arc<dyn NetworkChannel> = Arc::new(server_end);
    server.serve(server_end, server_inbox);
    client.serve(client_end.clone(), client_inbox);

    Fixture { server, client, service, channel: client_end, service_def, chain_target_def }
}
