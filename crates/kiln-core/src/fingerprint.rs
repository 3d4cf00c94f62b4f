//! Deterministic digests of nodes and their backend configuration.
use std::collections::BTreeMap;
use std::fmt::Write;

use base64::{engine::general_purpose::STANDARD_NO_PAD, Engine as _};
use serde::{Deserialize, Serialize};

use crate::{Graph, HashMap, Node, NodeId, Opcode};

/// Structured backend configuration attached to a node.
///
/// Map iteration order is unspecified; digests never depend on it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConfigValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    List(Vec<ConfigValue>),
    Map(HashMap<String, ConfigValue>),
}

impl ConfigValue {
    pub fn map<K: Into<String>>(entries: impl IntoIterator<Item = (K, ConfigValue)>) -> Self {
        ConfigValue::Map(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

/// Order-independent image of a [`ConfigValue`]; its binary encoding is the
/// digest input.
#[derive(Serialize)]
enum CanonicalValue<'a> {
    Null,
    Bool(bool),
    Int(i64),
    Float(u64),
    String(&'a str),
    List(Vec<CanonicalValue<'a>>),
    Map(BTreeMap<&'a str, CanonicalValue<'a>>),
}

impl<'a> From<&'a ConfigValue> for CanonicalValue<'a> {
    fn from(value: &'a ConfigValue) -> Self {
        match value {
            ConfigValue::Null => CanonicalValue::Null,
            ConfigValue::Bool(b) => CanonicalValue::Bool(*b),
            ConfigValue::Int(i) => CanonicalValue::Int(*i),
            ConfigValue::Float(f) => CanonicalValue::Float(f.to_bits()),
            ConfigValue::String(s) => CanonicalValue::String(s),
            ConfigValue::List(items) => CanonicalValue::List(items.iter().map(Into::into).collect()),
            ConfigValue::Map(entries) => CanonicalValue::Map(
                entries
                    .iter()
                    .map(|(k, v)| (k.as_str(), CanonicalValue::from(v)))
                    .collect(),
            ),
        }
    }
}

/// Text digest of `config`. Equal configurations give equal digests.
pub fn fingerprint_config(config: &ConfigValue) -> anyhow::Result<String> {
    let bytes = bincode::serialize(&CanonicalValue::from(config))?;
    Ok(STANDARD_NO_PAD.encode(bytes))
}

/// One-line rendering of a node for cache keys: type, opcode, operand names,
/// attributes, then `config_fingerprint=<digest>` when a backend config is
/// attached.
pub fn fingerprint_operation(graph: &Graph, id: NodeId) -> anyhow::Result<String> {
    let node = &graph[id];
    let operands = node
        .operands
        .iter()
        .map(|&op| format!("%{}", graph[op].name))
        .collect::<Vec<_>>()
        .join(", ");
    let mut out = format!("{} {}({})", node.ty, node.opcode.name(), operands);
    for attribute in attributes(graph, node) {
        write!(out, ", {attribute}")?;
    }
    if let Some(config) = &node.backend_config {
        write!(out, ", config_fingerprint={}", fingerprint_config(config)?)?;
    }
    log::trace!("Fingerprint of {}: {out}", node.name);
    Ok(out)
}

fn braced(values: &[usize]) -> String {
    let items = values.iter().map(|v| v.to_string()).collect::<Vec<_>>();
    format!("{{{}}}", items.join(","))
}

fn attributes(graph: &Graph, node: &Node) -> Vec<String> {
    match &node.opcode {
        Opcode::Parameter { index } => vec![format!("index={index}")],
        Opcode::Constant(literal) => {
            let hex: String = literal.as_bytes().iter().map(|b| format!("{b:02x}")).collect();
            vec![format!("literal={hex}")]
        }
        Opcode::Transpose { permutation: dims }
        | Opcode::Reduce { dimensions: dims }
        | Opcode::Broadcast { dimensions: dims }
        | Opcode::Reverse { dimensions: dims } => vec![format!("dimensions={}", braced(dims))],
        Opcode::Concatenate { dimension } => vec![format!("dimensions={{{dimension}}}")],
        Opcode::Slice(bounds) => {
            let ranges = (0..bounds.rank())
                .map(|d| format!("[{}:{}:{}]", bounds.starts[d], bounds.limits[d], bounds.strides[d]))
                .collect::<Vec<_>>();
            vec![format!("slice={{{}}}", ranges.join(", "))]
        }
        Opcode::DynamicSlice { sizes } => vec![format!("dynamic_slice_sizes={}", braced(sizes))],
        Opcode::Compare(direction) => vec![format!("direction={}", direction.as_str())],
        Opcode::GetTupleElement { index } => vec![format!("index={index}")],
        Opcode::Call { region } => vec![format!("to_apply={}", graph[*region].name)],
        Opcode::While {
            body,
            condition,
            induction_variable,
        } => {
            let mut attrs = vec![
                format!("condition={}", graph[*condition].name),
                format!("body={}", graph[*body].name),
            ];
            if let Some(iv) = induction_variable {
                attrs.push(format!("induction_variable={}", iv.tuple_index));
            }
            attrs
        }
        Opcode::Fusion { kind, region } => vec![
            format!("kind={}", kind.as_str()),
            format!("calls={}", graph[*region].name),
        ],
        Opcode::CustomCall { target } => vec![format!("custom_call_target=\"{target}\"")],
        Opcode::Dot(dims) => [
            ("lhs_batch_dims", &dims.lhs_batch),
            ("lhs_contracting_dims", &dims.lhs_contracting),
            ("rhs_batch_dims", &dims.rhs_batch),
            ("rhs_contracting_dims", &dims.rhs_contracting),
        ]
        .into_iter()
        .filter(|(_, d)| !d.is_empty())
        .map(|(label, d)| format!("{label}={}", braced(d)))
        .collect(),
        Opcode::Bitcast
        | Opcode::Reshape
        | Opcode::Copy
        | Opcode::DynamicUpdateSlice
        | Opcode::Convert(_)
        | Opcode::Unary(_)
        | Opcode::Binary(_)
        | Opcode::Select
        | Opcode::Tuple => vec![],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{shape, ArrayType, DType, GraphBuilder};
    use proptest::prelude::any;
    use test_strategy::proptest;

    fn sample_config() -> ConfigValue {
        ConfigValue::map([
            ("operation_queue_id", ConfigValue::Int(0)),
            ("wait_on_operation_queues", ConfigValue::List(vec![])),
            (
                "fusion_backend_config",
                ConfigValue::map([
                    ("kind", ConfigValue::String("__triton_gemm".into())),
                    ("block_m", ConfigValue::Int(32)),
                    ("split_k", ConfigValue::Int(1)),
                    ("num_warps", ConfigValue::Int(2)),
                ]),
            ),
        ])
    }

    #[test]
    fn custom_call_rendering() {
        let mut b = GraphBuilder::new();
        let mut entry = b.region("entry");
        let ty = ArrayType::row_major(DType::U8, shape![0]);
        let cc = entry.custom_call("custom-call", "", &[], ty);
        entry.set_backend_config(cc, sample_config());
        let entry = entry.finish(cc);
        let graph = b.build(entry);

        let rendered = fingerprint_operation(&graph, cc).unwrap();
        let digest = fingerprint_config(&sample_config()).unwrap();
        assert_eq!(
            rendered,
            format!("u8[0]{{0}} custom-call(), custom_call_target=\"\", config_fingerprint={digest}")
        );
    }

    #[test]
    fn no_config_no_suffix() {
        let mut b = GraphBuilder::new();
        let mut entry = b.region("entry");
        let p0 = entry.parameter("p0", ArrayType::row_major(DType::F32, shape![4, 8]));
        let t = entry.transpose("t", p0, &[1, 0]);
        let entry = entry.finish(t);
        let graph = b.build(entry);
        assert_eq!(
            fingerprint_operation(&graph, t).unwrap(),
            "f32[8,4]{1,0} transpose(%p0), dimensions={1,0}"
        );
    }

    #[test]
    fn distinguishes_values() {
        let a = fingerprint_config(&ConfigValue::map([("k", ConfigValue::Int(1))])).unwrap();
        let b = fingerprint_config(&ConfigValue::map([("k", ConfigValue::Int(2))])).unwrap();
        let c = fingerprint_config(&ConfigValue::map([("k", ConfigValue::Float(1.0))])).unwrap();
        assert_ne!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn parsed_json_matches_constructed() {
        let parsed: ConfigValue = serde_json::from_str(
            r#"{"wait_on_operation_queues": [], "fusion_backend_config": {"num_warps": 2, "split_k": 1, "block_m": 32, "kind": "__triton_gemm"}, "operation_queue_id": 0}"#,
        )
        .unwrap();
        assert_eq!(
            fingerprint_config(&parsed).unwrap(),
            fingerprint_config(&sample_config()).unwrap()
        );
    }

    #[proptest(cases = 32)]
    fn insertion_order_is_irrelevant(
        #[strategy(proptest::collection::btree_map("[a-z]{1,6}", any::<i64>(), 0..12))]
        entries: std::collections::BTreeMap<String, i64>,
    ) {
        let forward = ConfigValue::map(entries.iter().map(|(k, v)| (k.clone(), ConfigValue::Int(*v))));
        let backward = ConfigValue::map(
            entries
                .iter()
                .rev()
                .map(|(k, v)| (k.clone(), ConfigValue::Int(*v))),
        );
        assert_eq!(
            fingerprint_config(&forward).unwrap(),
            fingerprint_config(&backward).unwrap()
        );
    }
}
