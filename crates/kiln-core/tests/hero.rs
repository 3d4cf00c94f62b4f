use kiln_core::test_utils::{array, f32_array, node};
use kiln_core::{
    find_non_trivial_hero, find_non_trivial_hero_in_region, BinaryOp, DType, FusionAdaptor,
    FusionKind, Graph, GraphBuilder, Literal, NodeId, TiledTranspose, TransposeTilingConfig,
    UnaryOp,
};

fn init() -> TransposeTilingConfig {
    let _ = env_logger::builder().is_test(true).try_init();
    TransposeTilingConfig::default()
}

/// The hero of output `index` of the fusion at the root of the entry region.
fn hero_of_output(graph: &Graph, index: usize, config: &TransposeTilingConfig) -> NodeId {
    let fusion = graph[graph.entry()].root;
    let adaptor = FusionAdaptor::for_instruction(graph, fusion);
    find_non_trivial_hero(&adaptor, adaptor.roots()[index], config)
}

/// Resolving `hero` again within the entry fusion leaves it unchanged.
fn assert_stable_in_fusion(graph: &Graph, hero: NodeId, config: &TransposeTilingConfig) {
    let fusion = graph[graph.entry()].root;
    let adaptor = FusionAdaptor::for_instruction(graph, fusion);
    assert_eq!(find_non_trivial_hero(&adaptor, hero, config), hero);
}

#[test]
fn reduce_hero_of_epilogue() {
    let config = init();
    let mut b = GraphBuilder::new();
    let mut fused = b.region("fused_computation");
    let p0 = fused.parameter("param_0", f32_array(&[128, 64]));
    let p1 = fused.parameter("param_1", array(DType::BF16, &[]));
    let init = fused.convert("convert.0", p1, DType::F32);
    let reduce = fused.reduce("reduce.0", p0, init, &[0]);
    let out = fused.convert("convert.1", reduce, DType::BF16);
    let fused = fused.finish(out);

    let mut entry = b.region("main");
    let a0 = entry.parameter("param_0", f32_array(&[128, 64]));
    let a1 = entry.parameter("param_1", array(DType::BF16, &[]));
    let fusion = entry.fusion("fusion", FusionKind::Input, fused, &[a0, a1]);
    let entry = entry.finish(fusion);
    let graph = b.build(entry);

    let hero = hero_of_output(&graph, 0, &config);
    assert_eq!(graph[hero].name, "reduce.0");
    assert_stable_in_fusion(&graph, hero, &config);
}

#[test]
fn reduce_hero_shared_by_two_outputs() {
    let config = init();
    let mut b = GraphBuilder::new();
    let mut fused = b.region("fused_computation");
    let p0 = fused.parameter("param_0", f32_array(&[4, 2]));
    let neg = fused.unary("neg", UnaryOp::Negate, p0);
    let zero = fused.constant("constant_0", Literal::scalar(0f32));
    let reduce = fused.reduce("reduce.1", p0, zero, &[1]);
    let bitcast = fused.bitcast("bitcast.1", reduce, f32_array(&[1, 1, 4]));
    let sign = fused.unary("sign.1", UnaryOp::Sign, bitcast);
    let root = fused.tuple("tuple.12", &[neg, bitcast, sign]);
    let fused = fused.finish(root);

    let mut entry = b.region("main");
    let arg = entry.parameter("Arg_2.1", f32_array(&[4, 2]));
    let fusion = entry.fusion("fusion", FusionKind::Input, fused, &[arg]);
    let entry = entry.finish(fusion);
    let graph = b.build(entry);

    assert_eq!(graph[hero_of_output(&graph, 1, &config)].name, "reduce.1");
    let hero = hero_of_output(&graph, 2, &config);
    assert_eq!(graph[hero].name, "reduce.1");
    assert_stable_in_fusion(&graph, hero, &config);
}

#[test]
fn reduce_also_used_as_non_hero() {
    let config = init();
    let mut b = GraphBuilder::new();
    let mut fused = b.region("fused_computation");
    let p0 = fused.parameter("p0", f32_array(&[4]));
    let zero = fused.constant("zero", Literal::scalar(0f32));
    let reduce0 = fused.reduce("reduce.0", p0, zero, &[0]);
    let broadcast = fused.broadcast("broadcast", reduce0, [4], &[]);
    let reduce1 = fused.reduce("reduce.1", broadcast, zero, &[0]);
    let bitcast = fused.bitcast("bitcast", reduce0, f32_array(&[1]));
    let root = fused.tuple("tuple.1", &[reduce1, broadcast, bitcast]);
    let fused = fused.finish(root);

    let mut entry = b.region("main");
    let arg = entry.parameter("Arg0", f32_array(&[4]));
    let fusion = entry.fusion("fusion", FusionKind::Input, fused, &[arg]);
    let entry = entry.finish(fusion);
    let graph = b.build(entry);

    // reduce.0 feeds the broadcast but is not its hero.
    assert_eq!(graph[hero_of_output(&graph, 1, &config)].name, "broadcast");
    assert_eq!(graph[hero_of_output(&graph, 2, &config)].name, "reduce.0");
}

#[test]
fn transpose_behind_convert() {
    let config = init();
    let mut b = GraphBuilder::new();
    let mut fused = b.region("fusion");
    let p = fused.parameter("p", f32_array(&[32, 48, 64]));
    let t = fused.transpose("t", p, &[2, 1, 0]);
    let c = fused.convert("c", t, DType::S8);
    let fused = fused.finish(c);
    let graph = b.build(fused);

    assert_eq!(find_non_trivial_hero_in_region(&graph, c, &config), t);
    assert_eq!(find_non_trivial_hero_in_region(&graph, t, &config), t);
}

#[test]
fn transpose_behind_two_binary_ops() {
    let config = init();
    let mut b = GraphBuilder::new();
    let mut fused = b.region("fusion");
    let p = fused.parameter("p", f32_array(&[32, 48, 64]));
    let p2 = fused.parameter("p2", f32_array(&[64, 48, 32]));
    let t = fused.transpose("t", p, &[2, 1, 0]);
    let mul = fused.binary("mul", BinaryOp::Multiply, t, p2);
    let add = fused.binary("add", BinaryOp::Add, mul, p2);
    let fused = fused.finish(add);

    let mut entry = b.region("main");
    let a0 = entry.parameter("param0", f32_array(&[32, 48, 64]));
    let a1 = entry.parameter("param1", f32_array(&[64, 48, 32]));
    let fusion = entry.fusion("fusion", FusionKind::Input, fused, &[a0, a1]);
    let entry = entry.finish(fusion);
    let graph = b.build(entry);

    let hero = find_non_trivial_hero_in_region(&graph, add, &config);
    assert_eq!(hero, t);
    assert_eq!(find_non_trivial_hero_in_region(&graph, hero, &config), hero);
    let tiled = TiledTranspose::for_node(&graph, hero, &config).expect("tileable");
    assert_eq!(tiled.dimensions.to_vec(), vec![64, 48, 32]);
    assert_eq!(tiled.permutation.to_vec(), vec![2, 1, 0]);
}

#[test]
fn two_transposes_have_no_hero() {
    let config = init();
    let mut b = GraphBuilder::new();
    let mut fused = b.region("fusion");
    let p = fused.parameter("p", f32_array(&[32, 48, 64]));
    let p2 = fused.parameter("p2", f32_array(&[48, 32, 64]));
    let t = fused.transpose("t", p, &[2, 1, 0]);
    let bc = fused.bitcast("bc", p2, f32_array(&[1, 1536, 64]));
    let t2 = fused.transpose("t2", bc, &[0, 2, 1]);
    let bc2 = fused.bitcast("bc2", t2, f32_array(&[64, 48, 32]));
    let add = fused.binary("add", BinaryOp::Add, t, bc2);
    let fused = fused.finish(add);
    let graph = b.build(fused);

    let hero = find_non_trivial_hero_in_region(&graph, add, &config);
    assert_eq!(hero, add);
    assert!(TiledTranspose::for_node(&graph, hero, &config).is_none());
}

#[test]
fn hero_outside_fusion() {
    let config = init();
    let mut b = GraphBuilder::new();
    let mut f = b.region("f");
    let fp = f.parameter("p0", f32_array(&[100, 200, 300]));
    let fadd = f.binary("add", BinaryOp::Add, fp, fp);
    let f = f.finish(fadd);

    let mut entry = b.region("entry");
    let p0 = entry.parameter("p0", f32_array(&[300, 200, 100]));
    let t = entry.transpose("t", p0, &[2, 1, 0]);
    let fusion = entry.fusion("fusion", FusionKind::Loop, f, &[t]);
    let add = entry.binary("add", BinaryOp::Add, t, fusion);
    let entry = entry.finish(add);
    let graph = b.build(entry);

    let adaptor = FusionAdaptor::for_producer_consumer(&graph, t, fusion);
    let root = node(&graph, "f", "add");
    assert_eq!(find_non_trivial_hero(&adaptor, root, &config), t);
    assert_eq!(find_non_trivial_hero(&adaptor, t, &config), t);
}

#[test]
fn transpose_hero_inside_fusion() {
    let config = init();
    let mut b = GraphBuilder::new();
    let mut f = b.region("f");
    let fp = f.parameter("p0", f32_array(&[300, 200, 100]));
    let t = f.transpose("t", fp, &[2, 1, 0]);
    let fadd = f.binary("add", BinaryOp::Add, t, t);
    let f = f.finish(fadd);

    let mut entry = b.region("entry");
    let p0 = entry.parameter("p0", f32_array(&[300, 200, 100]));
    let p1 = entry.parameter("p1", f32_array(&[100, 200, 300]));
    let fusion = entry.fusion("fusion", FusionKind::Loop, f, &[p0]);
    let add = entry.binary("add", BinaryOp::Add, p1, fusion);
    let entry = entry.finish(add);
    let graph = b.build(entry);

    let adaptor = FusionAdaptor::for_producer_consumer(&graph, fusion, add);
    assert_eq!(find_non_trivial_hero(&adaptor, add, &config), t);
}

#[test]
fn transpose_also_reached_through_non_trivial_op() {
    let config = init();
    let mut b = GraphBuilder::new();
    let mut fused = b.region("fusion");
    let p = fused.parameter("p", array(DType::F64, &[16, 16]));
    let trans = fused.transpose("trans", p, &[1, 0]);
    let rev = fused.reverse("rev", trans, &[0, 1]);
    let sub = fused.binary("sub", BinaryOp::Subtract, trans, trans);
    let add = fused.binary("add", BinaryOp::Add, rev, sub);
    let fused = fused.finish(add);
    let graph = b.build(fused);

    let hero = find_non_trivial_hero_in_region(&graph, add, &config);
    assert_eq!(hero, add);
    assert!(TiledTranspose::for_node(&graph, hero, &config).is_none());
}

#[test]
fn concatenate_hero() {
    let config = init();
    let mut b = GraphBuilder::new();
    let mut fused = b.region("fusion");
    let p0 = fused.parameter("p0", f32_array(&[4, 8]));
    let p1 = fused.parameter("p1", f32_array(&[4, 8]));
    let concat = fused.concatenate("concat", &[p0, p1], 0);
    let neg = fused.unary("neg", UnaryOp::Negate, concat);
    let exp = fused.unary("exp", UnaryOp::Exp, neg);
    let fused = fused.finish(exp);
    let graph = b.build(fused);

    assert_eq!(find_non_trivial_hero_in_region(&graph, exp, &config), concat);
    assert_eq!(find_non_trivial_hero_in_region(&graph, concat, &config), concat);
    // A plain element-wise chain is its own hero.
    assert_eq!(find_non_trivial_hero_in_region(&graph, p0, &config), p0);
}
