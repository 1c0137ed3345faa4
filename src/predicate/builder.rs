//! Predicate Builder
//!
//! Fluent construction of predicate trees, the way a front end translates a
//! query string: `property(id).equals(v).and().property(id2).contains(w)`.
//! AND binds tighter than OR; `begin()`/`end()` group sub-expressions.

use super::{CompareOp, Predicate};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PredicateBuildError {
    #[error("operator `{0}` is not followed by an operand")]
    DanglingOperator(&'static str),
    #[error("operand follows another operand without `and`/`or`")]
    MissingOperator,
    #[error("comparison without a preceding `property(..)`")]
    MissingProperty,
    #[error("property `{0}` has no comparison")]
    MissingComparison(String),
    #[error("unbalanced `begin()`/`end()` group")]
    UnbalancedGroup,
}

/// One `begin()`..`end()` level: an OR of AND-ed terms
#[derive(Debug)]
struct Frame {
    disjuncts: Vec<Vec<Predicate>>,
    expecting_operand: bool,
    last_operator: &'static str,
    negated: bool,
}

impl Frame {
    fn new(negated: bool) -> Self {
        Self {
            disjuncts: vec![Vec::new()],
            expecting_operand: true,
            last_operator: "begin",
            negated,
        }
    }

    fn is_empty(&self) -> bool {
        self.disjuncts.len() == 1 && self.disjuncts[0].is_empty()
    }

    fn into_predicate(self) -> Predicate {
        let mut disjuncts: Vec<Predicate> = self
            .disjuncts
            .into_iter()
            .map(|mut terms| {
                if terms.len() == 1 {
                    terms.remove(0)
                } else {
                    Predicate::And(terms)
                }
            })
            .collect();

        let predicate = if disjuncts.len() == 1 {
            disjuncts.remove(0)
        } else {
            Predicate::Or(disjuncts)
        };

        if self.negated {
            Predicate::not(predicate)
        } else {
            predicate
        }
    }
}

/// Fluent predicate builder
#[derive(Debug)]
pub struct PredicateBuilder {
    frames: Vec<Frame>,
    property: Option<String>,
    negate_next: bool,
    error: Option<PredicateBuildError>,
}

impl Default for PredicateBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl PredicateBuilder {
    pub fn new() -> Self {
        Self {
            frames: vec![Frame::new(false)],
            property: None,
            negate_next: false,
            error: None,
        }
    }

    pub fn property(mut self, property_id: &str) -> Self {
        if self.error.is_some() {
            return self;
        }
        if let Some(pending) = self.property.take() {
            return self.fail(PredicateBuildError::MissingComparison(pending));
        }
        if !self.frame().expecting_operand {
            return self.fail(PredicateBuildError::MissingOperator);
        }
        self.property = Some(property_id.to_string());
        self
    }

    pub fn equals(self, value: impl ToString) -> Self {
        self.comparison(CompareOp::Equals, value)
    }

    pub fn not_equals(self, value: impl ToString) -> Self {
        self.comparison(CompareOp::NotEquals, value)
    }

    pub fn less_than(self, value: impl ToString) -> Self {
        self.comparison(CompareOp::Less, value)
    }

    pub fn less_than_equal_to(self, value: impl ToString) -> Self {
        self.comparison(CompareOp::LessOrEqual, value)
    }

    pub fn greater_than(self, value: impl ToString) -> Self {
        self.comparison(CompareOp::Greater, value)
    }

    pub fn greater_than_equal_to(self, value: impl ToString) -> Self {
        self.comparison(CompareOp::GreaterOrEqual, value)
    }

    pub fn contains(mut self, value: impl ToString) -> Self {
        if self.error.is_some() {
            return self;
        }
        match self.property.take() {
            Some(property_id) => self.push_operand(Predicate::Contains {
                property_id,
                value: value.to_string(),
            }),
            None => self.fail(PredicateBuildError::MissingProperty),
        }
    }

    pub fn and(self) -> Self {
        self.operator("and")
    }

    pub fn or(self) -> Self {
        self.operator("or")
    }

    /// Negate the next operand (a comparison or a `begin()` group)
    #[allow(clippy::should_implement_trait)]
    pub fn not(mut self) -> Self {
        if self.error.is_some() {
            return self;
        }
        if self.property.is_some() || !self.frame().expecting_operand {
            return self.fail(PredicateBuildError::MissingOperator);
        }
        self.negate_next = !self.negate_next;
        self
    }

    pub fn begin(mut self) -> Self {
        if self.error.is_some() {
            return self;
        }
        if self.property.is_some() || !self.frame().expecting_operand {
            return self.fail(PredicateBuildError::MissingOperator);
        }
        let negated = std::mem::take(&mut self.negate_next);
        self.frames.push(Frame::new(negated));
        self
    }

    pub fn end(mut self) -> Self {
        if self.error.is_some() {
            return self;
        }
        if let Some(pending) = self.property.take() {
            return self.fail(PredicateBuildError::MissingComparison(pending));
        }
        if self.frames.len() == 1 {
            return self.fail(PredicateBuildError::UnbalancedGroup);
        }
        let frame = self.frames.pop().unwrap_or_else(|| Frame::new(false));
        if frame.expecting_operand {
            return self.fail(PredicateBuildError::DanglingOperator(frame.last_operator));
        }
        self.push_operand(frame.into_predicate())
    }

    /// Finish the expression. An untouched builder yields [`Predicate::AlwaysTrue`].
    pub fn to_predicate(mut self) -> Result<Predicate, PredicateBuildError> {
        if let Some(error) = self.error {
            return Err(error);
        }
        if let Some(pending) = self.property {
            return Err(PredicateBuildError::MissingComparison(pending));
        }
        if self.frames.len() != 1 {
            return Err(PredicateBuildError::UnbalancedGroup);
        }
        let root = self.frames.remove(0);
        if root.is_empty() && !self.negate_next {
            return Ok(Predicate::AlwaysTrue);
        }
        if root.expecting_operand {
            let operator = if self.negate_next { "not" } else { root.last_operator };
            return Err(PredicateBuildError::DanglingOperator(operator));
        }
        Ok(root.into_predicate())
    }

    fn comparison(mut self, op: CompareOp, value: impl ToString) -> Self {
        if self.error.is_some() {
            return self;
        }
        match self.property.take() {
            Some(property_id) => self.push_operand(Predicate::Compare {
                property_id,
                op,
                value: value.to_string(),
            }),
            None => self.fail(PredicateBuildError::MissingProperty),
        }
    }

    fn operator(mut self, operator: &'static str) -> Self {
        if self.error.is_some() {
            return self;
        }
        if let Some(pending) = self.property.take() {
            return self.fail(PredicateBuildError::MissingComparison(pending));
        }
        if self.frame().expecting_operand {
            return self.fail(PredicateBuildError::DanglingOperator(operator));
        }
        let frame = self.frame_mut();
        frame.expecting_operand = true;
        frame.last_operator = operator;
        if operator == "or" {
            frame.disjuncts.push(Vec::new());
        }
        self
    }

    fn push_operand(mut self, operand: Predicate) -> Self {
        if !self.frame().expecting_operand {
            return self.fail(PredicateBuildError::MissingOperator);
        }
        let operand = if std::mem::take(&mut self.negate_next) {
            Predicate::not(operand)
        } else {
            operand
        };
        let frame = self.frame_mut();
        if let Some(terms) = frame.disjuncts.last_mut() {
            terms.push(operand);
        }
        frame.expecting_operand = false;
        self
    }

    fn fail(mut self, error: PredicateBuildError) -> Self {
        self.error.get_or_insert(error);
        self
    }

    fn frame(&self) -> &Frame {
        // The root frame is never popped
        &self.frames[self.frames.len() - 1]
    }

    fn frame_mut(&mut self) -> &mut Frame {
        let last = self.frames.len() - 1;
        &mut self.frames[last]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NAME: &str = "Cluster/name";
    const COLO: &str = "Cluster/colo";

    #[test]
    fn test_single_equality() {
        let p = PredicateBuilder::new()
            .property(NAME)
            .equals("Cluster1")
            .to_predicate()
            .unwrap();
        assert_eq!(p, Predicate::equals(NAME, "Cluster1"));
    }

    #[test]
    fn test_empty_builder_is_always_true() {
        assert_eq!(
            PredicateBuilder::new().to_predicate(),
            Ok(Predicate::AlwaysTrue)
        );
    }

    #[test]
    fn test_and_binds_tighter_than_or() {
        let p = PredicateBuilder::new()
            .property(NAME)
            .equals("a")
            .or()
            .property(NAME)
            .equals("b")
            .and()
            .property(COLO)
            .equals("c")
            .to_predicate()
            .unwrap();

        assert_eq!(
            p,
            Predicate::Or(vec![
                Predicate::equals(NAME, "a"),
                Predicate::And(vec![
                    Predicate::equals(NAME, "b"),
                    Predicate::equals(COLO, "c"),
                ]),
            ])
        );
    }

    #[test]
    fn test_groups_and_negation() {
        let p = PredicateBuilder::new()
            .property(COLO)
            .equals("c")
            .and()
            .not()
            .begin()
            .property(NAME)
            .equals("a")
            .or()
            .property(NAME)
            .greater_than(5)
            .end()
            .to_predicate()
            .unwrap();

        assert_eq!(
            p,
            Predicate::And(vec![
                Predicate::equals(COLO, "c"),
                Predicate::not(Predicate::Or(vec![
                    Predicate::equals(NAME, "a"),
                    Predicate::compare(NAME, CompareOp::Greater, 5),
                ])),
            ])
        );
    }

    #[test]
    fn test_not_on_comparison() {
        let p = PredicateBuilder::new()
            .not()
            .property("Cluster/locations")
            .contains("L1")
            .to_predicate()
            .unwrap();
        assert_eq!(
            p,
            Predicate::not(Predicate::contains("Cluster/locations", "L1"))
        );
    }

    #[test]
    fn test_all_comparison_operators() {
        let p = PredicateBuilder::new()
            .property(NAME)
            .not_equals("a")
            .and()
            .property(NAME)
            .less_than("z")
            .and()
            .property(NAME)
            .less_than_equal_to("y")
            .and()
            .property(NAME)
            .greater_than_equal_to("b")
            .to_predicate()
            .unwrap();

        match p {
            Predicate::And(terms) => assert_eq!(terms.len(), 4),
            other => panic!("expected conjunction, got {:?}", other),
        }
    }

    #[test]
    fn test_dangling_operator() {
        let err = PredicateBuilder::new()
            .property(NAME)
            .equals("a")
            .and()
            .to_predicate()
            .unwrap_err();
        assert_eq!(err, PredicateBuildError::DanglingOperator("and"));

        let err = PredicateBuilder::new().or().to_predicate().unwrap_err();
        assert_eq!(err, PredicateBuildError::DanglingOperator("or"));

        let err = PredicateBuilder::new().not().to_predicate().unwrap_err();
        assert_eq!(err, PredicateBuildError::DanglingOperator("not"));
    }

    #[test]
    fn test_missing_operator() {
        let err = PredicateBuilder::new()
            .property(NAME)
            .equals("a")
            .property(NAME)
            .equals("b")
            .to_predicate()
            .unwrap_err();
        assert_eq!(err, PredicateBuildError::MissingOperator);
    }

    #[test]
    fn test_missing_property_and_comparison() {
        let err = PredicateBuilder::new().equals("a").to_predicate().unwrap_err();
        assert_eq!(err, PredicateBuildError::MissingProperty);

        let err = PredicateBuilder::new().property(NAME).to_predicate().unwrap_err();
        assert_eq!(err, PredicateBuildError::MissingComparison(NAME.to_string()));
    }

    #[test]
    fn test_unbalanced_groups() {
        let err = PredicateBuilder::new()
            .begin()
            .property(NAME)
            .equals("a")
            .to_predicate()
            .unwrap_err();
        assert_eq!(err, PredicateBuildError::UnbalancedGroup);

        let err = PredicateBuilder::new()
            .property(NAME)
            .equals("a")
            .end()
            .to_predicate()
            .unwrap_err();
        assert_eq!(err, PredicateBuildError::UnbalancedGroup);

        let err = PredicateBuilder::new().begin().end().to_predicate().unwrap_err();
        assert_eq!(err, PredicateBuildError::DanglingOperator("begin"));
    }
}
