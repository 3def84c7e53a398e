//! 选择器、注册表、过滤器与 Peer 测试

use std::collections::HashMap;
use std::sync::Arc;

use flare_selector::selector::filter;
use flare_selector::{
    Balancer, BalancerBuilder, DefaultBuilder, DoneFunc, DoneInfo, EwmaBalancerBuilder,
    EwmaConfig, EwmaNodeBuilder, Node, NodeFilter, Peer, Rebalancer, Result, Selector,
    SelectorConfig, SelectorError, SelectorRegistry, TagFilter, WeightedNode,
};
use flare_selector::node::DirectNodeBuilder;
use http::Extensions;
use tokio_test::{assert_err, assert_ok};

fn registry() -> SelectorRegistry {
    SelectorRegistry::with_defaults(&EwmaConfig::default())
}

fn sample_nodes() -> Vec<Node> {
    vec![
        Node::new("grpc", "10.0.0.1:9000")
            .with_service_name("orders")
            .with_version("v1")
            .with_metadata("zone", "cn-beijing-a"),
        Node::new("grpc", "10.0.0.2:9000")
            .with_service_name("orders")
            .with_version("v2")
            .with_metadata("zone", "cn-beijing-b"),
        Node::new("grpc", "10.0.0.3:9000")
            .with_service_name("orders")
            .with_version("v2")
            .with_metadata("zone", "cn-shanghai-a")
            .with_metadata("canary", "true"),
    ]
}

fn select_address(selector: &dyn Selector, filters: &[NodeFilter]) -> String {
    let (node, done) = selector.select(&Extensions::new(), filters).expect("should succeed");
    done.call(&Extensions::new(), DoneInfo::success());
    node.address().to_string()
}

/// 测试：内置策略全部注册
#[test]
fn test_registry_defaults() {
    let registry = registry();
    assert_eq!(registry.names(), vec!["ewma", "p2c", "random", "wrr"]);
    assert!(registry.get("p2c").is_some());
    assert!(registry.get("round_robin").is_none());
}

/// 测试：未知策略
#[test]
fn test_registry_unknown_strategy() {
    let err = registry()
        .build("consistent_hash")
        .err()
        .expect("unknown strategy should fail");
    assert_eq!(err, SelectorError::UnknownStrategy("consistent_hash".to_string()));
}

/// 测试：按配置构建，默认策略为 p2c
#[test]
fn test_registry_build_from_config() {
    let registry = registry();
    let selector = registry
        .build_from_config(&SelectorConfig::default())
        .expect("should succeed");
    selector.apply(sample_nodes());
    assert_ok!(selector.select(&Extensions::new(), &[]));
}

/// 测试：配置中的策略别名归一化为注册名
#[test]
fn test_registry_build_from_config_alias() {
    let registry = registry();
    for alias in ["weighted_round_robin", "WRR", "weighted-round-robin"] {
        let config = SelectorConfig::from_toml_str(&format!("strategy = \"{}\"", alias))
            .expect("valid config");
        let selector = registry
            .build_from_config(&config)
            .expect("alias should resolve to wrr");
        selector.apply(vec![
            Node::new("grpc", "a").with_weight(2),
            Node::new("grpc", "b").with_weight(1),
        ]);
        let picks: Vec<String> = (0..3)
            .map(|_| select_address(selector.as_ref(), &[]))
            .collect();
        assert_eq!(picks, vec!["a", "b", "a"], "alias {}", alias);
    }

    let config = SelectorConfig::from_toml_str("strategy = \"p2c_ewma\"").expect("valid config");
    assert_ok!(registry.build_from_config(&config).map(|_| ()));

    // 自定义注册名按原样查找
    let config = SelectorConfig::from_toml_str("strategy = \"canary\"").expect("valid config");
    let err = registry
        .build_from_config(&config)
        .err()
        .expect("unregistered strategy should fail");
    assert_eq!(err, SelectorError::UnknownStrategy("canary".to_string()));
}

/// 测试：空快照返回 NoAvailable
#[test]
fn test_select_without_nodes() {
    for name in registry().names() {
        let selector = registry().build(&name).expect("should succeed");
        let err = selector.select(&Extensions::new(), &[]).unwrap_err();
        assert!(err.is_no_available(), "strategy {}", name);
    }
}

/// 测试：所有策略都能从快照中选出节点
#[test]
fn test_select_with_every_strategy() {
    let registry = registry();
    let addresses: Vec<String> = sample_nodes()
        .iter()
        .map(|n| n.address().to_string())
        .collect();

    for name in registry.names() {
        let selector = registry.build(&name).expect("should succeed");
        selector.apply(sample_nodes());
        for _ in 0..20 {
            let address = select_address(selector.as_ref(), &[]);
            assert!(addresses.contains(&address), "strategy {} picked {}", name, address);
        }
    }
}

/// 测试：按版本过滤
#[test]
fn test_version_filter() {
    let selector = registry().build("random").expect("should succeed");
    selector.apply(sample_nodes());

    let filters = vec![filter::version("v1")];
    for _ in 0..20 {
        assert_eq!(select_address(selector.as_ref(), &filters), "10.0.0.1:9000");
    }
}

/// 测试：过滤器按顺序组合
#[test]
fn test_filters_chain() {
    let selector = registry().build("random").expect("should succeed");
    selector.apply(sample_nodes());

    let filters = vec![
        filter::version("v2"),
        filter::tags(vec![TagFilter::prefix("zone", "cn-beijing")]),
    ];
    for _ in 0..20 {
        assert_eq!(select_address(selector.as_ref(), &filters), "10.0.0.2:9000");
    }

    let filters = vec![filter::metadata("canary", None)];
    for _ in 0..20 {
        assert_eq!(select_address(selector.as_ref(), &filters), "10.0.0.3:9000");
    }
}

/// 测试：过滤掉全部节点时返回 NoAvailable
#[test]
fn test_filters_remove_everything() {
    let selector = registry().build("p2c").expect("should succeed");
    selector.apply(sample_nodes());

    let filters = vec![filter::version("v3")];
    let err = selector.select(&Extensions::new(), &filters).unwrap_err();
    assert_eq!(err, SelectorError::NoAvailable);

    let drop_all: NodeFilter = Arc::new(|_ctx: &Extensions, _nodes: Vec<Node>| Vec::new());
    let err = selector.select(&Extensions::new(), &[drop_all]).unwrap_err();
    assert_eq!(err, SelectorError::NoAvailable);
}

/// 测试：过滤器可以读取调用上下文
#[test]
fn test_filter_reads_context() {
    #[derive(Clone)]
    struct Zone(&'static str);

    let selector = registry().build("wrr").expect("should succeed");
    selector.apply(sample_nodes());

    let by_zone: NodeFilter = Arc::new(|ctx: &Extensions, nodes: Vec<Node>| match ctx.get::<Zone>() {
        Some(zone) => nodes
            .into_iter()
            .filter(|n| n.metadata().get("zone").map(String::as_str) == Some(zone.0))
            .collect(),
        None => nodes,
    });

    let mut ctx = Extensions::new();
    ctx.insert(Zone("cn-shanghai-a"));
    let (node, _done) = selector.select(&ctx, &[by_zone]).expect("should succeed");
    assert_eq!(node.address(), "10.0.0.3:9000");
}

/// 测试：选中的节点写回 Peer
#[test]
fn test_peer_receives_selected_node() {
    let selector = registry().build("ewma").expect("should succeed");
    selector.apply(sample_nodes());

    let mut ctx = Extensions::new();
    let peer = Peer::attach(&mut ctx);
    assert!(peer.node().is_none());

    let (node, done) = selector.select(&ctx, &[]).expect("should succeed");
    let recorded = peer.node().expect("peer should be filled");
    assert!(recorded.ptr_eq(&node));
    done.call(&ctx, DoneInfo::success());

    // 没有 Peer 时不影响选择
    assert_ok!(selector.select(&Extensions::new(), &[]));
}

/// 测试：加权轮询遵循节点权重
#[test]
fn test_wrr_selector_honors_weights() {
    let selector = registry().build("wrr").expect("should succeed");
    selector.apply(vec![
        Node::new("grpc", "a").with_weight(5),
        Node::new("grpc", "b").with_weight(1),
        Node::new("grpc", "c").with_weight(1),
    ]);

    let mut counts: HashMap<String, usize> = HashMap::new();
    for _ in 0..700 {
        *counts.entry(select_address(selector.as_ref(), &[])).or_default() += 1;
    }
    assert_eq!(counts["a"], 500);
    assert_eq!(counts["b"], 100);
    assert_eq!(counts["c"], 100);
}

/// 测试：新快照整体替换旧快照
#[test]
fn test_apply_replaces_snapshot() {
    let selector = registry().build("random").expect("should succeed");
    selector.apply(sample_nodes());
    selector.apply(vec![Node::new("grpc", "10.0.0.9:9000")]);

    for _ in 0..20 {
        assert_eq!(select_address(selector.as_ref(), &[]), "10.0.0.9:9000");
    }

    selector.apply(Vec::new());
    assert_err!(selector.select(&Extensions::new(), &[]));
}

/// 测试：相同地址的节点跨快照保留统计数据
#[test]
fn test_apply_preserves_stats() {
    let builder = DefaultBuilder::new(
        Arc::new(EwmaNodeBuilder::new()),
        Arc::new(EwmaBalancerBuilder),
    );
    let selector = builder.build_default();
    selector.apply(vec![Node::new("grpc", "a")]);

    let (_node, done) = selector.select(&Extensions::new(), &[]).expect("should succeed");
    done.call(&Extensions::new(), DoneInfo::success());
    let warmed = selector.snapshot()[0].weight();
    assert!(warmed > 100.0, "warmed weight = {}", warmed);

    let renewed = Node::new("grpc", "a").with_version("v2");
    selector.apply(vec![renewed.clone(), Node::new("grpc", "b")]);

    let snapshot = selector.snapshot();
    assert_eq!(snapshot.len(), 2);
    assert!(snapshot[0].raw().ptr_eq(&renewed));
    assert!(snapshot[0].weight() > 100.0);
    // 新节点从冷启动开始
    assert!((snapshot[1].weight() - 100.0).abs() < 1e-9);

    // 不同协议视为不同节点
    selector.apply(vec![Node::new("http", "a")]);
    assert!((selector.snapshot()[0].weight() - 100.0).abs() < 1e-9);
}

/// 总是选择第一个候选的均衡器
struct FirstBalancer;

impl Balancer for FirstBalancer {
    fn pick(
        &self,
        _ctx: &Extensions,
        nodes: &[Arc<dyn WeightedNode>],
    ) -> Result<(Arc<dyn WeightedNode>, DoneFunc)> {
        let first = nodes.first().ok_or(SelectorError::NoAvailable)?;
        Ok((Arc::clone(first), first.pick()))
    }
}

struct FirstBuilder;

impl BalancerBuilder for FirstBuilder {
    fn build(&self) -> Box<dyn Balancer> {
        Box::new(FirstBalancer)
    }
}

/// 测试：注册自定义策略
#[test]
fn test_register_custom_strategy() {
    let mut registry = registry();
    let custom = Arc::new(DefaultBuilder::new(
        Arc::new(DirectNodeBuilder::default()),
        Arc::new(FirstBuilder),
    ));

    assert!(registry.register("first", custom.clone()).is_none());
    assert!(registry.register("first", custom).is_some());

    let selector = registry.build("first").expect("should succeed");
    selector.apply(sample_nodes());
    for _ in 0..5 {
        assert_eq!(select_address(selector.as_ref(), &[]), "10.0.0.1:9000");
    }
}
