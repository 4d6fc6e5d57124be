//! Calls and chains driven through senders, across two nodes on an in-process link.

mod common;

use std::sync::atomic::Ordering;
use std::time::Duration;

use anyhow::Result;
use fleetrpc::MethodType;
use fleetrpc::Value;
use fleetrun::CallError;
use fleetrun::ChainError;
use fleetrun::MemoryChannel;
use fleetrun::RpcSender;

use common::CHAIN_TARGET;
use common::ChainTargetRef;
use common::SERVICE;

fn ty(descriptor: &str) -> MethodType {
    MethodType::parse(descriptor).unwrap()
}

// ============================================================================
//  SINGLE CALLS
// ============================================================================

#[tokio::test]
async fn test_hello_world() -> Result<()> {
    let fx = common::connected();
    let sender = fx.client.sender(SERVICE, fx.channel.clone()).build()?;

    let greeting: String = sender
        .invoke_method("helloWorld", ty("(I)T"), [Value::Int(123)])
        .fire_as()
        .await?;
    assert_eq!(greeting, "Hello World, for the 123. time!");
    assert_eq!(fx.service.calls.load(Ordering::SeqCst), 1);
    Ok(())
}

#[tokio::test]
async fn test_round() -> Result<()> {
    let fx = common::connected();
    let sender = fx.client.sender(SERVICE, fx.channel.clone()).build()?;
    let rounded = sender
        .invoke_method("round", ty("(D)J"), [Value::Double(189.793491)])
        .fire()
        .await?;
    assert_eq!(rounded, Value::Long(190));
    Ok(())
}

#[tokio::test]
async fn test_overflow_surfaces_as_execution_error() -> Result<()> {
    let fx = common::connected();
    let sender = fx.client.sender(SERVICE, fx.channel.clone()).build()?;

    let err = sender
        .invoke_method("sum", ty("(JJ)J"), [Value::Long(i64::MAX), Value::Long(1024)])
        .fire()
        .await
        .unwrap_err();
    let CallError::Execution(err) = err else {
        panic!("expected an execution error, got {err:?}");
    };
    assert!(err.message.starts_with("ArithmeticException: long overflow"), "{}", err.message);
    assert_eq!(err.kind, "ArithmeticException");
    assert_eq!(err.frames[0].method, "add_exact");
    assert_eq!(err.frames[1].owner, SERVICE);
    assert_eq!(err.frames[1].method, "sum");
    Ok(())
}

#[tokio::test]
async fn test_business_fault_keeps_kind_and_detail() -> Result<()> {
    let fx = common::connected();
    let sender = fx.client.sender(SERVICE, fx.channel.clone()).build()?;
    let err = sender
        .invoke_method("fail", ty("(T)V"), [Value::from("out of stock")])
        .fire()
        .await
        .unwrap_err();
    assert!(matches!(&err, CallError::Execution(e) if e.message == "IllegalStateException: out of stock"));
    Ok(())
}

#[tokio::test]
async fn test_rejections_surface_as_bad_request() -> Result<()> {
    let fx = common::connected();
    let sender = fx.client.sender(SERVICE, fx.channel.clone()).build()?;
    let err = sender.invoke_method("nope", ty("()V"), []).fire().await.unwrap_err();
    assert_eq!(err, CallError::BadRequest("target method not found".into()));

    let unbound = fx.client.sender(CHAIN_TARGET, fx.channel.clone()).build()?;
    let err = unbound
        .invoke_method("addToCounter", ty("(F)D"), [Value::Float(1.0)])
        .fire()
        .await
        .unwrap_err();
    assert_eq!(err, CallError::Server("no instance to invoke the method on".into()));
    Ok(())
}

#[tokio::test]
async fn test_void_method_answers_null() -> Result<()> {
    let fx = common::connected();
    let sender = fx.client.sender(SERVICE, fx.channel.clone()).build()?;
    let () = sender
        .invoke_method("increment", ty("(I)V"), [Value::Int(3)])
        .fire_as()
        .await?;
    assert_eq!(fx.service.calls.load(Ordering::SeqCst), 3);
    Ok(())
}

#[tokio::test]
async fn test_typed_invoke_derives_descriptor() -> Result<()> {
    let fx = common::connected();
    let sender = fx.client.sender(SERVICE, fx.channel.clone()).build()?;

    let rpc = sender.invoke::<_, String>("helloWorld", (123i32,));
    assert_eq!(rpc.descriptor().method_descriptor(), "(I)T");
    let greeting: String = rpc.fire_as().await?;
    assert_eq!(greeting, "Hello World, for the 123. time!");

    let sum: i64 = sender.invoke::<_, i64>("sum", (40i64, 2i64)).fire_as().await?;
    assert_eq!(sum, 42);
    Ok(())
}

#[tokio::test]
async fn test_argument_not_matching_descriptor_is_never_sent() -> Result<()> {
    let (channel, mut sent) = MemoryChannel::sink();
    let sender = RpcSender::builder(SERVICE).channel(std::sync::Arc::new(channel)).build()?;
    let err = sender
        .invoke_method("helloWorld", ty("(I)T"), [Value::from("not an int")])
        .fire()
        .await
        .unwrap_err();
    assert!(matches!(err, CallError::Protocol(_)), "{err:?}");
    assert!(sent.try_recv().is_err());
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_calls_get_their_own_answers() -> Result<()> {
    let fx = common::connected();
    let sender = fx.client.sender(SERVICE, fx.channel.clone()).build()?;

    let calls = (0..32i32).map(|i| {
        let sender = sender.clone();
        tokio::spawn(async move {
            let greeting = sender.invoke::<_, String>("helloWorld", (i,)).fire_as::<String>().await;
            (i, greeting)
        })
    });
    for joined in futures::future::join_all(calls).await {
        let (i, greeting) = joined?;
        assert_eq!(greeting?, format!("Hello World, for the {i}. time!"));
    }
    assert_eq!(fx.service.calls.load(Ordering::SeqCst), 32);
    assert_eq!(fx.client.queries().pending_count(), 0);
    Ok(())
}

// ============================================================================
//  CHAINS
// ============================================================================

#[tokio::test]
async fn test_chain_runs_against_previous_result() -> Result<()> {
    let fx = common::connected();
    let service = fx.client.sender_for(&fx.service_def, fx.channel.clone()).build()?;
    let target = fx.client.sender_for(&fx.chain_target_def, fx.channel.clone()).build()?;

    let total = service
        .invoke_method("chainedTest", ty("(I)LchainTarget;"), [Value::Int(235)])
        .join(target.invoke_method("addToCounter", ty("(F)D"), [Value::Float(9.5)]))?
        .fire()
        .await?;
    assert_eq!(total, Value::Double(249.5));
    Ok(())
}

#[tokio::test]
async fn test_typed_chain() -> Result<()> {
    let fx = common::connected();
    let service = fx.client.sender(SERVICE, fx.channel.clone()).build()?;
    let target = fx.client.sender(CHAIN_TARGET, fx.channel.clone()).build()?;

    let printed: String = service
        .invoke::<_, ChainTargetRef>("chainedTest", (235i32,))
        .join(target.invoke::<_, String>("printCounter", ('X', None::<String>)))?
        .fire_as()
        .await?;
    assert_eq!(printed, "X240null");
    Ok(())
}

#[tokio::test]
async fn test_chain_passes_null_arguments() -> Result<()> {
    let fx = common::connected();
    let service = fx.client.sender(SERVICE, fx.channel.clone()).build()?;
    let target = fx.client.sender(CHAIN_TARGET, fx.channel.clone()).build()?;

    let printed: String = service
        .invoke_method("chainedTest", ty("(I)LchainTarget;"), [Value::Int(235)])
        .join(target.invoke_method("printCounter", ty("(CT)T"), [Value::Char('X'), Value::Null]))?
        .fire_as()
        .await?;
    assert_eq!(printed, "X240null");
    Ok(())
}

#[tokio::test]
async fn test_null_mid_chain_is_a_null_pointer() -> Result<()> {
    let fx = common::connected();
    let service = fx.client.sender(SERVICE, fx.channel.clone()).build()?;
    let target = fx.client.sender(CHAIN_TARGET, fx.channel.clone()).build()?;

    let err = service
        .invoke_method("nothing", ty("()LchainTarget;"), [])
        .join(target.invoke_method("addToCounter", ty("(F)D"), [Value::Float(1.0)]))?
        .fire()
        .await
        .unwrap_err();
    let CallError::Execution(err) = err else {
        panic!("expected an execution error, got {err:?}");
    };
    assert!(err.message.starts_with("NullPointerException:"), "{}", err.message);
    Ok(())
}

#[tokio::test]
async fn test_join_rejects_non_receivers() -> Result<()> {
    let fx = common::connected();
    let service = fx.client.sender(SERVICE, fx.channel.clone()).build()?;
    let target = fx.client.sender(CHAIN_TARGET, fx.channel.clone()).build()?;

    let err = service
        .invoke_method("helloWorld", ty("(I)T"), [Value::Int(1)])
        .join(target.invoke_method("addToCounter", ty("(F)D"), [Value::Float(1.0)]))
        .err()
        .unwrap();
    assert_eq!(
        err,
        ChainError::ReceiverNotObject { method: "helloWorld".into(), returns: "T".into() }
    );

    let err = service
        .invoke_method("chainedTest", ty("(I)LchainTarget;"), [Value::Int(1)])
        .join(service.invoke_method("helloWorld", ty("(I)T"), [Value::Int(1)]))
        .err()
        .unwrap();
    assert!(matches!(err, ChainError::TargetMismatch { .. }));
    Ok(())
}

// ============================================================================
//  COMPLETION MODES
// ============================================================================

#[tokio::test]
async fn test_fire_and_forget_still_runs() -> Result<()> {
    let fx = common::connected();
    let sender = fx.client.sender(SERVICE, fx.channel.clone()).build()?;
    sender
        .invoke_method("increment", ty("(I)V"), [Value::Int(7)])
        .fire_and_forget()
        .await?;

    tokio::time::timeout(Duration::from_secs(2), async {
        while fx.service.calls.load(Ordering::SeqCst) != 7 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await?;
    assert_eq!(fx.client.queries().pending_count(), 0);
    Ok(())
}

#[tokio::test]
async fn test_no_result_call_cannot_be_awaited() -> Result<()> {
    let fx = common::connected();
    let sender = fx.client.sender(SERVICE, fx.channel.clone()).build()?;
    let err = sender
        .invoke_method("increment", ty("(I)V"), [Value::Int(1)])
        .no_result()
        .fire()
        .await
        .unwrap_err();
    assert_eq!(err, CallError::NoResultExpected);
    Ok(())
}

#[tokio::test]
async fn test_unanswered_call_times_out() -> Result<()> {
    let (channel, _unread) = MemoryChannel::sink();
    let sender = RpcSender::builder(SERVICE)
        .channel(std::sync::Arc::new(channel))
        .timeout(Duration::from_millis(30))
        .build()?;
    let err = sender
        .invoke_method("helloWorld", ty("(I)T"), [Value::Int(1)])
        .fire()
        .await
        .unwrap_err();
    assert_eq!(err, CallError::Timeout(Duration::from_millis(30)));
    Ok(())
}

#[tokio::test]
async fn test_chain_timeout_is_the_first_calls() -> Result<()> {
    let (channel, _unread) = MemoryChannel::sink();
    let channel: std::sync::Arc<dyn fleetrun::NetworkChannel> = std::sync::Arc::new(channel);
    let service = RpcSender::builder(SERVICE).channel(channel.clone()).build()?;
    let target = RpcSender::builder(CHAIN_TARGET).channel(channel).build()?;

    let err = service
        .invoke_method("chainedTest", ty("(I)LchainTarget;"), [Value::Int(1)])
        .timeout(Duration::from_millis(30))
        .join(
            target
                .invoke_method("addToCounter", ty("(F)D"), [Value::Float(1.0)])
                .timeout(Duration::from_secs(10)),
        )?
        .fire()
        .await
        .unwrap_err();
    assert_eq!(err, CallError::Timeout(Duration::from_millis(30)));
    Ok(())
}

#[tokio::test]
async fn test_joined_no_result_does_not_change_the_chain() -> Result<()> {
    let fx = common::connected();
    let service = fx.client.sender(SERVICE, fx.channel.clone()).build()?;
    let target = fx.client.sender(CHAIN_TARGET, fx.channel.clone()).build()?;

    let total = service
        .invoke_method("chainedTest", ty("(I)LchainTarget;"), [Value::Int(235)])
        .join(target.invoke_method("addToCounter", ty("(F)D"), [Value::Float(9.5)]).no_result())?
        .fire()
        .await?;
    assert_eq!(total, Value::Double(249.5));
    Ok(())
}

#[tokio::test]
async fn test_abandoned_calls_leave_no_pending_queries() -> Result<()> {
    let (channel, _unread) = MemoryChannel::sink();
    let node = fleetrun::RpcNode::new(fleetrun::RpcConfig::default());
    let sender = node.sender(SERVICE, std::sync::Arc::new(channel)).build()?;
    for i in 0..100 {
        let call = sender.invoke_method("helloWorld", ty("(I)T"), [Value::Int(i)]).fire();
        assert!(tokio::time::timeout(Duration::from_millis(1), call).await.is_err());
    }
    assert_eq!(node.queries().pending_count(), 0);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_fire_sync_inside_multi_thread_runtime() -> Result<()> {
    let fx = common::connected();
    let sender = fx.client.sender(SERVICE, fx.channel.clone()).build()?;
    let rounded = sender
        .invoke_method("round", ty("(D)J"), [Value::Double(2.4)])
        .fire_sync_as::<i64>()?;
    assert_eq!(rounded, 2);
    Ok(())
}

#[tokio::test]
async fn test_fire_sync_refuses_to_block_current_thread_runtime() -> Result<()> {
    let fx = common::connected();
    let sender = fx.client.sender(SERVICE, fx.channel.clone()).build()?;
    let err = sender
        .invoke_method("round", ty("(D)J"), [Value::Double(2.4)])
        .fire_sync()
        .unwrap_err();
    assert_eq!(err, CallError::WouldBlock);
    Ok(())
}

#[test]
fn test_fire_sync_from_plain_thread() -> Result<()> {
    let runtime = tokio::runtime::Runtime::new()?;
    let fx = runtime.block_on(async { common::connected() });
    let sender = fx
        .client
        .sender(SERVICE, fx.channel.clone())
        .runtime(runtime.handle().clone())
        .build()?;

    let worker = std::thread::spawn(move || {
        sender
            .invoke_method("helloWorld", ty("(I)T"), [Value::Int(5)])
            .fire_sync_as::<String>()
    });
    let greeting = worker.join().unwrap()?;
    assert_eq!(greeting, "Hello World, for the 5. time!");
    Ok(())
}

#[test]
fn test_fire_sync_without_runtime() -> Result<()> {
    let (channel, _unread) = MemoryChannel::sink();
    let sender = RpcSender::builder(SERVICE).channel(std::sync::Arc::new(channel)).build()?;
    let err = sender
        .invoke_method("helloWorld", ty("(I)T"), [Value::Int(1)])
        .fire_sync()
        .unwrap_err();
    assert_eq!(err, CallError::NoRuntime);
    Ok(())
}
