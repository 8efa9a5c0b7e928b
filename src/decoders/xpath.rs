//! XPath subset shared by the HTML, JSON and XML elements
//!
//! Supported syntax:
//! - `/` and `//` separators, with a leading `/` or `//` rooted at the
//!   context node
//! - steps `name`, `*`, `.`, `..`, `@name`, `@*`, `text()`, `node()`
//! - predicates `[n]`, `[last()]`, `[x]`, `[x='v']`, `[x!='v']`,
//!   `[contains(x,'v')]`, `[starts-with(x,'v')]` where `x` is `@name`, `@*`,
//!   `text()`, `.` or a child name
//!
//! The context node acts as the document root: absolute paths start from it
//! and `..` never climbs above it.

use crate::{Result, TrawlError};
use std::collections::HashSet;
use std::hash::Hash;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum NodeKind {
    Root,
    Element,
    Attribute,
    Text,
    Other,
}

/// A node of a tree the evaluator can walk
pub(crate) trait XPathNode: Clone + Eq + Hash {
    fn kind(&self) -> NodeKind;

    /// Local name of an element or attribute
    fn name(&self) -> Option<String>;

    fn parent(&self) -> Option<Self>;

    /// Child nodes, attributes excluded
    fn children(&self) -> Vec<Self>;

    fn attributes(&self) -> Vec<Self>;

    /// Concatenated text of the node and its descendants
    fn string_value(&self) -> String;
}

#[derive(Debug, Clone, PartialEq)]
enum NodeTest {
    SelfNode,
    Parent,
    Element(Option<String>),
    Attribute(Option<String>),
    Text,
    Node,
}

#[derive(Debug, Clone, PartialEq)]
enum Operand {
    Attribute(Option<String>),
    Child(String),
    Text,
    SelfNode,
}

#[derive(Debug, Clone, PartialEq)]
enum Predicate {
    Position(usize),
    Last,
    Exists(Operand),
    Equals(Operand, String),
    NotEquals(Operand, String),
    Contains(Operand, String),
    StartsWith(Operand, String),
}

#[derive(Debug, Clone, PartialEq)]
struct Step {
    deep: bool,
    test: NodeTest,
    predicates: Vec<Predicate>,
}

/// A compiled expression
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct XPath {
    steps: Vec<Step>,
}

impl XPath {
    pub(crate) fn compile(expr: &str) -> Result<Self> {
        Parser::new(expr).parse()
    }

    /// Returns the nodes selected from `context`, in evaluation order and
    /// without duplicates
    pub(crate) fn select<N: XPathNode>(&self, context: &N) -> Vec<N> {
        let root = context;
        let mut current = vec![context.clone()];

        for step in &self.steps {
            let mut seen = HashSet::new();
            let mut next = Vec::new();

            for node in &current {
                let bases = if step.deep {
                    descendants_or_self(node)
                } else {
                    vec![node.clone()]
                };

                for base in &bases {
                    let group = apply_predicates(axis(root, base, &step.test), &step.predicates);
                    for found in group {
                        if seen.insert(found.clone()) {
                            next.push(found);
                        }
                    }
                }
            }

            current = next;
            if current.is_empty() {
                break;
            }
        }

        current
    }

    pub(crate) fn first<N: XPathNode>(&self, context: &N) -> Option<N> {
        self.select(context).into_iter().next()
    }
}

fn descendants_or_self<N: XPathNode>(node: &N) -> Vec<N> {
    let mut out = Vec::new();
    let mut stack = vec![node.clone()];
    while let Some(current) = stack.pop() {
        let mut children = current.children();
        children.reverse();
        out.push(current);
        stack.extend(children);
    }
    out
}

fn axis<N: XPathNode>(root: &N, node: &N, test: &NodeTest) -> Vec<N> {
    match test {
        NodeTest::SelfNode => vec![node.clone()],
        NodeTest::Parent => {
            if node == root {
                Vec::new()
            } else {
                node.parent().into_iter().collect()
            }
        }
        NodeTest::Element(name) => node
            .children()
            .into_iter()
            .filter(|child| child.kind() == NodeKind::Element && name_matches(child, name))
            .collect(),
        NodeTest::Attribute(name) => node
            .attributes()
            .into_iter()
            .filter(|attr| name_matches(attr, name))
            .collect(),
        NodeTest::Text => node
            .children()
            .into_iter()
            .filter(|child| child.kind() == NodeKind::Text)
            .collect(),
        NodeTest::Node => node.children(),
    }
}

fn name_matches<N: XPathNode>(node: &N, name: &Option<String>) -> bool {
    match name {
        None => true,
        Some(name) => node.name().as_deref() == Some(name.as_str()),
    }
}

fn apply_predicates<N: XPathNode>(mut group: Vec<N>, predicates: &[Predicate]) -> Vec<N> {
    for predicate in predicates {
        group = match predicate {
            Predicate::Position(position) => group
                .into_iter()
                .nth(position - 1)
                .into_iter()
                .collect(),
            Predicate::Last => group.pop().into_iter().collect(),
            other => group
                .into_iter()
                .filter(|node| test_predicate(node, other))
                .collect(),
        };
    }
    group
}

fn test_predicate<N: XPathNode>(node: &N, predicate: &Predicate) -> bool {
    match predicate {
        Predicate::Exists(operand) => !operand_nodes(node, operand).is_empty(),
        Predicate::Equals(operand, literal) => operand_nodes(node, operand)
            .iter()
            .any(|n| n.string_value() == *literal),
        Predicate::NotEquals(operand, literal) => operand_nodes(node, operand)
            .iter()
            .any(|n| n.string_value() != *literal),
        Predicate::Contains(operand, literal) => {
            operand_string(node, operand).contains(literal.as_str())
        }
        Predicate::StartsWith(operand, literal) => {
            operand_string(node, operand).starts_with(literal.as_str())
        }
        Predicate::Position(_) | Predicate::Last => true,
    }
}

fn operand_nodes<N: XPathNode>(node: &N, operand: &Operand) -> Vec<N> {
    match operand {
        Operand::Attribute(name) => axis(node, node, &NodeTest::Attribute(name.clone())),
        Operand::Child(name) => axis(node, node, &NodeTest::Element(Some(name.clone()))),
        Operand::Text => axis(node, node, &NodeTest::Text),
        Operand::SelfNode => vec![node.clone()],
    }
}

fn operand_string<N: XPathNode>(node: &N, operand: &Operand) -> String {
    operand_nodes(node, operand)
        .first()
        .map(XPathNode::string_value)
        .unwrap_or_default()
}

struct Parser<'a> {
    expr: &'a str,
    chars: Vec<char>,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(expr: &'a str) -> Self {
        Self {
            expr,
            chars: expr.chars().collect(),
            pos: 0,
        }
    }

    fn parse(mut self) -> Result<XPath> {
        self.skip_ws();
        if self.at_end() {
            return Err(self.invalid());
        }

        let mut steps = Vec::new();
        let mut deep = false;
        if self.eat("//") {
            deep = true;
        } else if self.eat("/") {
            self.skip_ws();
            if self.at_end() {
                return Ok(XPath {
                    steps: vec![Step {
                        deep: false,
                        test: NodeTest::SelfNode,
                        predicates: Vec::new(),
                    }],
                });
            }
        }

        loop {
            self.skip_ws();
            steps.push(self.parse_step(deep)?);
            self.skip_ws();

            if self.at_end() {
                break;
            }
            if self.eat("//") {
                deep = true;
            } else if self.eat("/") {
                deep = false;
            } else {
                return Err(self.invalid());
            }
        }

        Ok(XPath { steps })
    }

    fn parse_step(&mut self, deep: bool) -> Result<Step> {
        let test = if self.eat("..") {
            NodeTest::Parent
        } else if self.eat(".") {
            NodeTest::SelfNode
        } else if self.eat("@") {
            NodeTest::Attribute(self.parse_name_test()?)
        } else if self.eat("*") {
            NodeTest::Element(None)
        } else {
            let name = self.parse_name()?;
            if self.eat_call() {
                match name.as_str() {
                    "text" => NodeTest::Text,
                    "node" => NodeTest::Node,
                    _ => return Err(self.invalid()),
                }
            } else {
                NodeTest::Element(Some(name))
            }
        };

        let mut predicates = Vec::new();
        loop {
            self.skip_ws();
            if !self.eat("[") {
                break;
            }
            predicates.push(self.parse_predicate()?);
        }

        Ok(Step {
            deep,
            test,
            predicates,
        })
    }

    fn parse_predicate(&mut self) -> Result<Predicate> {
        self.skip_ws();

        let predicate = if self.peek().map_or(false, |c| c.is_ascii_digit()) {
            let number = self.parse_number()?;
            if number == 0 {
                return Err(self.invalid());
            }
            Predicate::Position(number)
        } else if self.eat("last()") {
            Predicate::Last
        } else if self.eat("contains(") {
            let (operand, literal) = self.parse_call_args()?;
            Predicate::Contains(operand, literal)
        } else if self.eat("starts-with(") {
            let (operand, literal) = self.parse_call_args()?;
            Predicate::StartsWith(operand, literal)
        } else {
            let operand = self.parse_operand()?;
            self.skip_ws();
            if self.eat("!=") {
                self.skip_ws();
                Predicate::NotEquals(operand, self.parse_literal()?)
            } else if self.eat("=") {
                self.skip_ws();
                Predicate::Equals(operand, self.parse_literal()?)
            } else {
                Predicate::Exists(operand)
            }
        };

        self.skip_ws();
        if !self.eat("]") {
            return Err(self.invalid());
        }
        Ok(predicate)
    }

    fn parse_call_args(&mut self) -> Result<(Operand, String)> {
        self.skip_ws();
        let operand = self.parse_operand()?;
        self.skip_ws();
        if !self.eat(",") {
            return Err(self.invalid());
        }
        self.skip_ws();
        let literal = self.parse_literal()?;
        self.skip_ws();
        if !self.eat(")") {
            return Err(self.invalid());
        }
        Ok((operand, literal))
    }

    fn parse_operand(&mut self) -> Result<Operand> {
        if self.eat("@") {
            return Ok(Operand::Attribute(self.parse_name_test()?));
        }
        if self.eat(".") {
            return Ok(Operand::SelfNode);
        }

        let name = self.parse_name()?;
        if self.eat_call() {
            return match name.as_str() {
                "text" => Ok(Operand::Text),
                _ => Err(self.invalid()),
            };
        }
        Ok(Operand::Child(name))
    }

    fn parse_literal(&mut self) -> Result<String> {
        match self.peek() {
            Some(quote @ ('\'' | '"')) => {
                self.pos += 1;
                let start = self.pos;
                while let Some(c) = self.peek() {
                    if c == quote {
                        let literal = self.chars[start..self.pos].iter().collect();
                        self.pos += 1;
                        return Ok(literal);
                    }
                    self.pos += 1;
                }
                Err(self.invalid())
            }
            Some(c) if c.is_ascii_digit() || c == '-' => {
                let start = self.pos;
                self.pos += 1;
                while self
                    .peek()
                    .map_or(false, |c| c.is_ascii_digit() || c == '.')
                {
                    self.pos += 1;
                }
                Ok(self.chars[start..self.pos].iter().collect())
            }
            _ => Err(self.invalid()),
        }
    }

    fn parse_number(&mut self) -> Result<usize> {
        let start = self.pos;
        while self.peek().map_or(false, |c| c.is_ascii_digit()) {
            self.pos += 1;
        }
        let digits: String = self.chars[start..self.pos].iter().collect();
        digits.parse().map_err(|_| self.invalid())
    }

    fn parse_name_test(&mut self) -> Result<Option<String>> {
        if self.eat("*") {
            Ok(None)
        } else {
            self.parse_name().map(Some)
        }
    }

    fn parse_name(&mut self) -> Result<String> {
        let start = self.pos;
        match self.peek() {
            Some(c) if c.is_alphabetic() || c == '_' => self.pos += 1,
            _ => return Err(self.invalid()),
        }
        while self
            .peek()
            .map_or(false, |c| c.is_alphanumeric() || matches!(c, '_' | '-' | '.'))
        {
            self.pos += 1;
        }
        // Namespace prefixes are accepted and ignored.
        if self.peek() == Some(':') && self.chars.get(self.pos + 1) != Some(&':') {
            self.pos += 1;
            return self.parse_name();
        }
        Ok(self.chars[start..self.pos].iter().collect())
    }

    fn eat_call(&mut self) -> bool {
        let save = self.pos;
        self.skip_ws();
        if self.eat("(") {
            self.skip_ws();
            if self.eat(")") {
                return true;
            }
        }
        self.pos = save;
        false
    }

    fn eat(&mut self, token: &str) -> bool {
        let len = token.chars().count();
        let matches = self.chars.len() >= self.pos + len
            && self.chars[self.pos..self.pos + len]
                .iter()
                .copied()
                .eq(token.chars());
        if matches {
            self.pos += len;
        }
        matches
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn skip_ws(&mut self) {
        while self.peek().map_or(false, char::is_whitespace) {
            self.pos += 1;
        }
    }

    fn at_end(&self) -> bool {
        self.pos >= self.chars.len()
    }

    fn invalid(&self) -> TrawlError {
        TrawlError::Expression(format!("{} has an invalid token", self.expr))
    }
}
