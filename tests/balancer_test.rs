//! 负载均衡策略测试

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use flare_selector::balancer::{
    EwmaBalancer, P2cBalancer, RandomBalancer, WrrBalancer,
};
use flare_selector::node::DirectNodeBuilder;
use flare_selector::{Balancer, ManualClock, Node, SelectorError, WeightedNode, WeightedNodeBuilder};
use http::Extensions;

fn weighted(builder: &DirectNodeBuilder, address: &str, weight: i64) -> Arc<dyn WeightedNode> {
    builder.build(Node::new("grpc", address).with_weight(weight))
}

fn pick_address(balancer: &dyn Balancer, nodes: &[Arc<dyn WeightedNode>]) -> String {
    let (node, _done) = balancer
        .pick(&Extensions::new(), nodes)
        .expect("pick should succeed");
    node.raw().address().to_string()
}

/// 测试：所有策略在候选为空时返回 NoAvailable
#[test]
fn test_empty_candidates() {
    let balancers: Vec<Box<dyn Balancer>> = vec![
        Box::new(RandomBalancer),
        Box::new(WrrBalancer::new()),
        Box::new(EwmaBalancer),
        Box::new(P2cBalancer::default()),
    ];
    for balancer in balancers {
        let err = balancer.pick(&Extensions::new(), &[]).unwrap_err();
        assert_eq!(err, SelectorError::NoAvailable);
    }
}

/// 测试：平滑加权轮询 [5,1,1] 的经典序列
#[test]
fn test_wrr_smooth_sequence() {
    let builder = DirectNodeBuilder::default();
    let nodes = vec![
        weighted(&builder, "a", 5),
        weighted(&builder, "b", 1),
        weighted(&builder, "c", 1),
    ];
    let balancer = WrrBalancer::new();

    let sequence: Vec<String> = (0..7).map(|_| pick_address(&balancer, &nodes)).collect();
    assert_eq!(sequence, vec!["a", "a", "b", "a", "c", "a", "a"]);

    // 下一轮重复同样的序列
    let sequence: Vec<String> = (0..7).map(|_| pick_address(&balancer, &nodes)).collect();
    assert_eq!(sequence, vec!["a", "a", "b", "a", "c", "a", "a"]);
}

/// 测试：等权重时按顺序轮询
#[test]
fn test_wrr_equal_weights() {
    let builder = DirectNodeBuilder::default();
    let nodes = vec![
        weighted(&builder, "a", 10),
        weighted(&builder, "b", 10),
        weighted(&builder, "c", 10),
    ];
    let balancer = WrrBalancer::new();

    let sequence: Vec<String> = (0..6).map(|_| pick_address(&balancer, &nodes)).collect();
    assert_eq!(sequence, vec!["a", "b", "c", "a", "b", "c"]);
}

/// 测试：候选地址不断变化时，current_weight 只保留近期的地址
#[test]
fn test_wrr_state_bounded_by_candidates() {
    let builder = DirectNodeBuilder::default();
    let balancer = WrrBalancer::new();

    for generation in 0..1000 {
        let nodes: Vec<Arc<dyn WeightedNode>> = (0..3)
            .map(|i| weighted(&builder, &format!("10.{}.0.{}:9000", generation, i), 1))
            .collect();
        pick_address(&balancer, &nodes);
        assert!(balancer.tracked() <= 6, "tracked = {}", balancer.tracked());
    }

    // 稳定的候选集合仍然保持平滑序列
    let nodes = vec![
        weighted(&builder, "a", 5),
        weighted(&builder, "b", 1),
        weighted(&builder, "c", 1),
    ];
    let balancer = WrrBalancer::new();
    let sequence: Vec<String> = (0..7).map(|_| pick_address(&balancer, &nodes)).collect();
    assert_eq!(sequence, vec!["a", "a", "b", "a", "c", "a", "a"]);
    assert_eq!(balancer.tracked(), 3);
}

/// 测试：未设置权重的节点使用默认权重
#[test]
fn test_wrr_default_weight() {
    let builder = DirectNodeBuilder::default();
    let nodes = vec![
        builder.build(Node::new("grpc", "a")),
        weighted(&builder, "b", 100),
    ];
    assert_eq!(nodes[0].weight(), 100.0);

    let balancer = WrrBalancer::new();
    let mut counts: HashMap<String, usize> = HashMap::new();
    for _ in 0..100 {
        *counts.entry(pick_address(&balancer, &nodes)).or_default() += 1;
    }
    assert_eq!(counts["a"], 50);
    assert_eq!(counts["b"], 50);
}

/// 测试：随机选择覆盖所有节点
#[test]
fn test_random_covers_all_nodes() {
    let builder = DirectNodeBuilder::default();
    let nodes = vec![
        weighted(&builder, "a", 1),
        weighted(&builder, "b", 1),
        weighted(&builder, "c", 1),
    ];
    let balancer = RandomBalancer;

    let mut counts: HashMap<String, usize> = HashMap::new();
    for _ in 0..3000 {
        *counts.entry(pick_address(&balancer, &nodes)).or_default() += 1;
    }
    assert_eq!(counts.len(), 3);
    for (address, count) in counts {
        // 期望 1000 次，允许 ±10%
        assert!(
            (900..=1100).contains(&count),
            "node {} picked {} times",
            address,
            count
        );
    }
}

/// 测试：EWMA 策略选择权重最大的节点，相同时取第一个
#[test]
fn test_ewma_picks_max_weight() {
    let builder = DirectNodeBuilder::default();
    let nodes = vec![
        weighted(&builder, "a", 10),
        weighted(&builder, "b", 50),
        weighted(&builder, "c", 30),
        weighted(&builder, "d", 50),
    ];
    let balancer = EwmaBalancer;
    for _ in 0..10 {
        assert_eq!(pick_address(&balancer, &nodes), "b");
    }
}

/// 测试：P2C 只有一个候选时直接返回
#[test]
fn test_p2c_single_candidate() {
    let builder = DirectNodeBuilder::default();
    let nodes = vec![weighted(&builder, "only", 1)];
    let balancer = P2cBalancer::default();
    for _ in 0..10 {
        assert_eq!(pick_address(&balancer, &nodes), "only");
    }
}

/// 测试：P2C 选择较重节点，长时间未被选中的节点会被强制选择一次
#[test]
fn test_p2c_force_pick() {
    let clock = Arc::new(ManualClock::new(Duration::from_secs(10)));
    let builder = DirectNodeBuilder::default().with_clock(clock.clone());
    let nodes = vec![weighted(&builder, "heavy", 100), weighted(&builder, "light", 10)];
    let balancer = P2cBalancer::default();

    // 两个节点都从未被选中，落选的 light 先被强制选中一次
    assert_eq!(pick_address(&balancer, &nodes), "light");
    for _ in 0..20 {
        assert_eq!(pick_address(&balancer, &nodes), "heavy");
    }

    clock.advance(Duration::from_secs(4));
    assert_eq!(pick_address(&balancer, &nodes), "light");
    assert_eq!(pick_address(&balancer, &nodes), "heavy");
}

/// 测试：静态节点记录选择时间
#[test]
fn test_direct_pick_elapsed() {
    let clock = Arc::new(ManualClock::new(Duration::from_secs(10)));
    let builder = DirectNodeBuilder::default().with_clock(clock.clone());
    let node = weighted(&builder, "a", 1);

    let _done = node.pick();
    clock.advance(Duration::from_millis(1500));
    assert_eq!(node.pick_elapsed(), Duration::from_millis(1500));

    // 重新绑定后共享选择时间
    let rebound = node.rebind(Node::new("grpc", "a").with_weight(2));
    assert_eq!(rebound.pick_elapsed(), Duration::from_millis(1500));
    assert_eq!(rebound.weight(), 2.0);
}
