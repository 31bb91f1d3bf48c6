//! Arena-backed dataflow graph.
//!
//! Nodes live in a `Vec` and are addressed by [`NodeId`]. An edge is an
//! [`Output`], the `(node, slot)` pair of the producing node. A node may only
//! consume outputs of nodes added before it, so the arena order is already a
//! valid topological order and cycles cannot be expressed.

use std::collections::HashMap;
use std::fmt;

use tg_tensor::{ElementType, PartialShape, TensorBuffer};

use crate::error::{GraphError, Result};
use crate::ops;

/// Index of a node in its [`Graph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub usize);

impl NodeId {
    pub fn index(&self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One result slot of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Output {
    pub node: NodeId,
    pub index: usize,
}

impl Output {
    pub fn new(node: NodeId, index: usize) -> Self {
        Self { node, index }
    }
}

impl fmt::Display for Output {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.node, self.index)
    }
}

/// Statically known type and shape of an output slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputInfo {
    pub element_type: ElementType,
    pub shape: PartialShape,
}

impl OutputInfo {
    pub fn new(element_type: ElementType, shape: impl Into<PartialShape>) -> Self {
        Self {
            element_type,
            shape: shape.into(),
        }
    }
}

/// A node attribute value.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    Int(i64),
    Ints(Vec<i64>),
    Float(f64),
    Bool(bool),
    Type(ElementType),
    Shape(PartialShape),
    Tensor(TensorBuffer),
}

/// Named attributes of a node.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Attributes {
    values: HashMap<String, AttributeValue>,
}

impl Attributes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an attribute. Returns `self` for chaining.
    pub fn with(mut self, name: &str, value: AttributeValue) -> Self {
        self.values.insert(name.to_string(), value);
        self
    }

    pub fn insert(&mut self, name: &str, value: AttributeValue) {
        self.values.insert(name.to_string(), value);
    }

    pub fn get(&self, name: &str) -> Option<&AttributeValue> {
        self.values.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    fn missing(name: &str) -> GraphError {
        GraphError::Attribute(format!("missing attribute '{}'", name))
    }

    fn wrong_kind(name: &str, expected: &str) -> GraphError {
        GraphError::Attribute(format!("attribute '{}' is not {}", name, expected))
    }

    /// Integer attribute.
    pub fn int(&self, name: &str) -> Result<i64> {
        match self.get(name) {
            Some(AttributeValue::Int(v)) => Ok(*v),
            Some(_) => Err(Self::wrong_kind(name, "an int")),
            None => Err(Self::missing(name)),
        }
    }

    /// Integer attribute with a default when absent.
    pub fn int_or(&self, name: &str, default: i64) -> Result<i64> {
        if self.contains(name) {
            self.int(name)
        } else {
            Ok(default)
        }
    }

    /// Boolean attribute with a default when absent.
    pub fn bool_or(&self, name: &str, default: bool) -> Result<bool> {
        match self.get(name) {
            Some(AttributeValue::Bool(v)) => Ok(*v),
            Some(AttributeValue::Int(v)) => Ok(*v != 0),
            Some(_) => Err(Self::wrong_kind(name, "a bool")),
            None => Ok(default),
        }
    }

    pub fn element_type(&self, name: &str) -> Result<ElementType> {
        match self.get(name) {
            Some(AttributeValue::Type(t)) => Ok(*t),
            Some(_) => Err(Self::wrong_kind(name, "an element type")),
            None => Err(Self::missing(name)),
        }
    }

    pub fn shape(&self, name: &str) -> Result<&PartialShape> {
        match self.get(name) {
            Some(AttributeValue::Shape(s)) => Ok(s),
            Some(_) => Err(Self::wrong_kind(name, "a shape")),
            None => Err(Self::missing(name)),
        }
    }

    pub fn tensor(&self, name: &str) -> Result<&TensorBuffer> {
        match self.get(name) {
            Some(AttributeValue::Tensor(t)) => Ok(t),
            Some(_) => Err(Self::wrong_kind(name, "a tensor")),
            None => Err(Self::missing(name)),
        }
    }
}

/// A vertex of the graph: one operation with its inputs and declared outputs.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    /// Operation type, the key into the operator registry (e.g. "Add").
    pub op_type: String,
    pub inputs: Vec<Output>,
    pub attributes: Attributes,
    /// Declared type and shape of each output slot; never empty.
    pub outputs: Vec<OutputInfo>,
}

impl Node {
    pub fn new(
        op_type: &str,
        inputs: Vec<Output>,
        attributes: Attributes,
        outputs: Vec<OutputInfo>,
    ) -> Self {
        Self {
            op_type: op_type.to_string(),
            inputs,
            attributes,
            outputs,
        }
    }

    pub fn output_count(&self) -> usize {
        self.outputs.len()
    }

    pub fn is_parameter(&self) -> bool {
        self.op_type == ops::PARAMETER
    }

    pub fn is_constant(&self) -> bool {
        self.op_type == ops::CONSTANT
    }
}

/// Dataflow graph of tensor operations.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Graph {
    nodes: Vec<Node>,
}

impl Graph {
    /// Create a new empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a node and return its ID.
    ///
    /// Every input must name an existing slot of an earlier node.
    pub fn add_node(&mut self, node: Node) -> Result<NodeId> {
        if node.outputs.is_empty() {
            return Err(GraphError::InvalidGraph(format!(
                "{} node declares no outputs",
                node.op_type
            )));
        }
        for input in &node.inputs {
            self.output_info(*input)?;
        }
        let id = NodeId(self.nodes.len());
        self.nodes.push(node);
        Ok(id)
    }

    pub fn node(&self, id: NodeId) -> Result<&Node> {
        self.nodes
            .get(id.index())
            .ok_or_else(|| GraphError::InvalidGraph(format!("node {} not found", id)))
    }

    /// Iterate over all nodes in insertion order.
    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &Node)> {
        self.nodes.iter().enumerate().map(|(i, n)| (NodeId(i), n))
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Declared type and shape of an output slot.
    pub fn output_info(&self, output: Output) -> Result<&OutputInfo> {
        self.node(output.node)?
            .outputs
            .get(output.index)
            .ok_or_else(|| GraphError::InvalidGraph(format!("output {} not found", output)))
    }

    /// The embedded value if `output` is produced by a Constant node.
    pub fn constant_value(&self, output: Output) -> Option<&TensorBuffer> {
        let node = self.node(output.node).ok()?;
        if !node.is_constant() || output.index != 0 {
            return None;
        }
        node.attributes.tensor(ops::constant::VALUE).ok()
    }

    /// Nodes the given roots depend on (roots included), each listed after all
    /// of its inputs. Nodes not reachable from a root are left out.
    pub fn dependency_order(&self, roots: impl IntoIterator<Item = NodeId>) -> Result<Vec<NodeId>> {
        let mut visited = vec![false; self.nodes.len()];
        let mut order = Vec::new();
        let mut stack: Vec<(NodeId, bool)> = roots.into_iter().map(|id| (id, false)).collect();
        stack.reverse();

        while let Some((id, expanded)) = stack.pop() {
            if expanded {
                order.push(id);
                continue;
            }
            let node = self.node(id)?;
            if visited[id.index()] {
                continue;
            }
            visited[id.index()] = true;
            stack.push((id, true));
            for input in node.inputs.iter().rev() {
                if !visited[input.node.index()] {
                    stack.push((input.node, false));
                }
            }
        }

        Ok(order)
    }

    /// Number of times each output is read by the given nodes.
    pub fn use_counts<'a>(
        &self,
        nodes: impl IntoIterator<Item = &'a NodeId>,
    ) -> Result<HashMap<Output, usize>> {
        let mut uses = HashMap::new();
        for id in nodes {
            for input in &self.node(*id)?.inputs {
                *uses.entry(*input).or_insert(0) += 1;
            }
        }
        Ok(uses)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info() -> OutputInfo {
        OutputInfo::new(ElementType::F32, PartialShape::scalar())
    }

    fn leaf(graph: &mut Graph) -> NodeId {
        graph
            .add_node(Node::new("Leaf", vec![], Attributes::new(), vec![info()]))
            .unwrap()
    }

    fn join(graph: &mut Graph, inputs: &[NodeId]) -> NodeId {
        let inputs = inputs.iter().map(|&n| Output::new(n, 0)).collect();
        graph
            .add_node(Node::new("Join", inputs, Attributes::new(), vec![info()]))
            .unwrap()
    }

    #[test]
    fn test_add_node_rejects_dangling_input() {
        let mut graph = Graph::new();
        let dangling = Node::new(
            "Join",
            vec![Output::new(NodeId(3), 0)],
            Attributes::new(),
            vec![info()],
        );
        assert!(matches!(
            graph.add_node(dangling),
            Err(GraphError::InvalidGraph(_))
        ));

        let a = leaf(&mut graph);
        let bad_slot = Node::new(
            "Join",
            vec![Output::new(a, 1)],
            Attributes::new(),
            vec![info()],
        );
        assert!(graph.add_node(bad_slot).is_err());
    }

    #[test]
    fn test_add_node_rejects_no_outputs() {
        let mut graph = Graph::new();
        let node = Node::new("Sink", vec![], Attributes::new(), vec![]);
        assert!(graph.add_node(node).is_err());
    }

    #[test]
    fn test_dependency_order_prunes_and_orders() {
        let mut graph = Graph::new();
        let a = leaf(&mut graph);
        let b = leaf(&mut graph);
        let unused = leaf(&mut graph);
        let c = join(&mut graph, &[b, a]);
        let d = join(&mut graph, &[c, a]);
        let _dead = join(&mut graph, &[unused]);

        let order = graph.dependency_order([d]).unwrap();
        assert_eq!(order.len(), 4);
        assert!(!order.contains(&unused));
        let pos = |id: NodeId| order.iter().position(|&x| x == id).unwrap();
        assert!(pos(a) < pos(c));
        assert!(pos(b) < pos(c));
        assert!(pos(c) < pos(d));
    }

    #[test]
    fn test_dependency_order_shared_ancestor_listed_once() {
        let mut graph = Graph::new();
        let a = leaf(&mut graph);
        let b = join(&mut graph, &[a]);
        let c = join(&mut graph, &[a]);
        let order = graph.dependency_order([b, c, b]).unwrap();
        assert_eq!(order.iter().filter(|&&id| id == a).count(), 1);
        assert_eq!(order.len(), 3);
    }

    #[test]
    fn test_use_counts() {
        let mut graph = Graph::new();
        let a = leaf(&mut graph);
        let b = join(&mut graph, &[a, a]);
        let uses = graph.use_counts(&[a, b]).unwrap();
        assert_eq!(uses.get(&Output::new(a, 0)), Some(&2));
        assert_eq!(uses.get(&Output::new(b, 0)), None);
    }

    #[test]
    fn test_attributes() {
        let attrs = Attributes::new()
            .with("axis", AttributeValue::Int(-1))
            .with("keep_dims", AttributeValue::Bool(true))
            .with("to", AttributeValue::Type(ElementType::I32));
        assert_eq!(attrs.int("axis").unwrap(), -1);
        assert_eq!(attrs.int_or("missing", 4).unwrap(), 4);
        assert!(attrs.bool_or("keep_dims", false).unwrap());
        assert_eq!(attrs.element_type("to").unwrap(), ElementType::I32);
        assert!(matches!(attrs.int("to"), Err(GraphError::Attribute(_))));
        assert!(matches!(attrs.tensor("value"), Err(GraphError::Attribute(_))));
    }
}
