//! Fixture emitter.
//!
//! Assembles one self-contained C test routine from an [`Oracle`]:
//!
//! 1. construct the network
//! 2. fill `network.w1`, `network.w2`, `network.b1`, `network.b2`
//! 3. allocate + fill the expected gradients `nabla_w1`, `nabla_b1`, ...
//! 4. allocate + fill `inputs` and `label`
//! 5. allocate the output arrays `nabla_w[]` / `nabla_b[]` and call `back_propagation`
//! 6. `assert_scalar` on the loss
//! 7. one `assert_array` per gradient
//! 8. `free` every buffer from steps 3-5
//!
//! Every `malloc` goes through a [`BufferLedger`]. The ledger is checked before any
//! text is returned, so an emitted routine always frees exactly what it allocates.

use std::fmt;

use crate::collaborator::{
    self, ASSERT_ARRAY, ASSERT_SCALAR, BACK_PROPAGATION, MAKE_NETWORK, NABLA_B, NABLA_W,
    NETWORK_TYPE, NETWORK_VAR,
};
use crate::serializer::{alloc_statement, fill_statements, float_literal};
use crate::{Error, GeneratorConfig, Oracle, Param, Result, Tensor};

/// One level of indentation inside the routine body.
pub const INDENT: &str = "    ";

/// Order in which parameters are written into the network struct.
const NETWORK_FILL_ORDER: [Param; 4] = [Param::W1, Param::W2, Param::B1, Param::B2];

/// Tracks buffers acquired and released by the emitted code.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BufferLedger {
    acquired: Vec<String>,
    released: Vec<String>,
}

impl BufferLedger {
    pub fn acquire(&mut self, name: impl Into<String>) {
        self.acquired.push(name.into());
    }

    pub fn release(&mut self, name: impl Into<String>) {
        self.released.push(name.into());
    }

    pub fn acquired(&self) -> &[String] {
        &self.acquired
    }

    pub fn released(&self) -> &[String] {
        &self.released
    }

    /// Every acquired buffer is released exactly once and nothing else is released.
    pub fn check(&self) -> Result<()> {
        let mut acquired = self.acquired.clone();
        let mut released = self.released.clone();
        acquired.sort();
        released.sort();

        if let Some(dup) = acquired.windows(2).find(|w| w[0] == w[1]) {
            return Err(Error::Unbalanced(format!("{} allocated twice", dup[0])));
        }
        if let Some(dup) = released.windows(2).find(|w| w[0] == w[1]) {
            return Err(Error::Unbalanced(format!("{} freed twice", dup[0])));
        }
        if let Some(leak) = acquired.iter().find(|a| !released.contains(a)) {
            return Err(Error::Unbalanced(format!("{leak} is never freed")));
        }
        if let Some(stray) = released.iter().find(|r| !acquired.contains(r)) {
            return Err(Error::Unbalanced(format!("{stray} is freed but never allocated")));
        }
        Ok(())
    }
}

/// A generated test routine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fixture {
    text: String,
    ledger: BufferLedger,
    assignments: usize,
}

impl Fixture {
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn into_string(self) -> String {
        self.text
    }

    #[inline]
    pub fn ledger(&self) -> &BufferLedger {
        &self.ledger
    }

    /// Number of element assignments (network, gradients, inputs and label).
    #[inline]
    pub fn assignments(&self) -> usize {
        self.assignments
    }
}

impl fmt::Display for Fixture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Body lines plus the allocation ledger for one routine.
#[derive(Debug, Default)]
struct Body {
    lines: Vec<String>,
    ledger: BufferLedger,
    assignments: usize,
}

impl Body {
    fn line(&mut self, line: impl Into<String>) {
        self.lines.push(line.into());
    }

    fn section(&mut self, comment: &str) {
        self.lines.push(String::new());
        self.lines.push(format!("// {comment}"));
    }

    fn fill(&mut self, target: &str, tensor: &Tensor) -> Result<()> {
        let statements = fill_statements(target, tensor)?;
        self.assignments += statements.len();
        self.lines.extend(statements);
        Ok(())
    }

    fn alloc_and_fill(&mut self, name: &str, tensor: &Tensor) -> Result<()> {
        self.line(alloc_statement(name, tensor));
        self.ledger.acquire(name);
        self.fill(name, tensor)
    }

    fn free(&mut self, name: &str) {
        self.line(format!("free({name});"));
        self.ledger.release(name);
    }
}

/// Emit the complete test routine for `oracle`.
pub fn emit(oracle: &Oracle, config: &GeneratorConfig) -> Result<Fixture> {
    config.validate()?;
    if oracle.shape() != config.shape {
        return Err(Error::InvalidShape(format!(
            "oracle shape {:?} does not match configured shape {:?}",
            oracle.shape(),
            config.shape
        )));
    }

    let shape = oracle.shape();
    let mut body = Body::default();

    body.line(format!(
        "{NETWORK_TYPE} {NETWORK_VAR} = {MAKE_NETWORK}({}, {}, {});",
        shape.s0, shape.s1, shape.s2
    ));

    body.section("fill network");
    for param in NETWORK_FILL_ORDER {
        body.fill(&collaborator::network_field(param), oracle.param(param))?;
    }

    body.section("fill gradients");
    for param in Param::ALL {
        body.alloc_and_fill(
            &collaborator::expected_gradient_buffer(param),
            oracle.gradient(param),
        )?;
    }

    body.section("fill inputs and label");
    body.alloc_and_fill("inputs", oracle.inputs())?;
    body.alloc_and_fill("label", oracle.label())?;

    body.section("run backprop");
    for (array, params) in [(NABLA_W, [Param::W1, Param::W2]), (NABLA_B, [Param::B1, Param::B2])] {
        body.line(format!("double *{array}[] = {{"));
        for param in params {
            body.line(format!(
                "{INDENT}malloc({} * sizeof(double)),",
                collaborator::output_gradient_size(param)
            ));
            body.ledger.acquire(collaborator::output_gradient_slot(param));
        }
        body.line("};");
    }
    body.line(format!(
        "double loss = {BACK_PROPAGATION}({NETWORK_VAR}, inputs, label, {NABLA_W}, {NABLA_B});"
    ));

    body.section("compare loss");
    let loss = float_literal(oracle.loss()).ok_or_else(|| Error::NonFinite {
        name: "loss".to_owned(),
        index: 0,
        value: oracle.loss(),
    })?;
    body.line(format!("{ASSERT_SCALAR}(\"loss\", {loss}, loss);"));

    body.section("compare gradients");
    for param in Param::ALL {
        let expected = collaborator::expected_gradient_buffer(param);
        body.line(format!(
            "{ASSERT_ARRAY}(\"{expected}\", {}, {expected}, {});",
            oracle.gradient(param).numel(),
            collaborator::output_gradient_slot(param)
        ));
    }

    body.section("free gradients");
    for param in Param::ALL {
        body.free(&collaborator::expected_gradient_buffer(param));
    }
    for param in [Param::W1, Param::W2, Param::B1, Param::B2] {
        body.free(&collaborator::output_gradient_slot(param));
    }
    body.line("// free inputs and labels");
    body.free("inputs");
    body.free("label");

    body.ledger.check()?;

    let mut text = format!(
        "/* automatically generated by '{}' */\n",
        config.generator_name
    );
    if config.emit_assert_primitives {
        text.push_str(&collaborator::assert_primitives());
        text.push('\n');
    }
    text.push_str(&format!("void {}()\n{{\n", config.routine_name));
    text.push_str(&indent_lines(&body.lines));
    text.push_str("}\n");

    tracing::debug!(
        lines = body.lines.len(),
        assignments = body.assignments,
        buffers = body.ledger.acquired().len(),
        "fixture emitted"
    );

    Ok(Fixture {
        text,
        ledger: body.ledger,
        assignments: body.assignments,
    })
}

/// Indent each line by [`INDENT`] and strip trailing whitespace.
///
/// Blank lines stay empty rather than carrying the indent.
pub fn indent_lines<S: AsRef<str>>(lines: &[S]) -> String {
    let mut out = String::new();
    for line in lines {
        let line = line.as_ref().trim_end();
        if !line.is_empty() {
            out.push_str(INDENT);
            out.push_str(line);
        }
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::NetworkShape;

    fn fixture() -> Fixture {
        let cfg = GeneratorConfig::default();
        let oracle = Oracle::evaluate(cfg.shape, cfg.seed).unwrap();
        emit(&oracle, &cfg).unwrap()
    }

    #[test]
    fn starts_with_marker_and_wraps_routine() {
        let f = fixture();
        let mut lines = f.as_str().lines();
        assert_eq!(
            lines.next(),
            Some("/* automatically generated by 'backprop-oracle' */")
        );
        assert_eq!(lines.next(), Some("void test_back_propagation()"));
        assert_eq!(lines.next(), Some("{"));
        assert_eq!(
            lines.next(),
            Some("    Network network = make_network(2, 3, 4);")
        );
        assert!(f.as_str().ends_with("\n}\n"));
    }

    #[test]
    fn body_is_indented_without_trailing_whitespace() {
        let f = fixture();
        let body: Vec<&str> = f.as_str().lines().skip(3).collect();
        let (last, body) = body.split_last().unwrap();
        assert_eq!(*last, "}");
        for line in body {
            assert_eq!(line.trim_end(), *line);
            assert!(line.is_empty() || line.starts_with(INDENT), "{line:?}");
        }
    }

    #[test]
    fn sections_appear_in_order() {
        let f = fixture();
        let text = f.as_str();
        let order = [
            "make_network(",
            "// fill network",
            "network.w1[0 * 2 + 0 * 1] = ",
            "network.w2[0 * 3 + 0 * 1] = ",
            "network.b1[0 * 1] = ",
            "network.b2[0 * 1] = ",
            "// fill gradients",
            "double *nabla_w1 = malloc(6 * sizeof(double));",
            "double *nabla_b1 = malloc(3 * sizeof(double));",
            "double *nabla_w2 = malloc(12 * sizeof(double));",
            "double *nabla_b2 = malloc(4 * sizeof(double));",
            "// fill inputs and label",
            "double *inputs = malloc(2 * sizeof(double));",
            "double *label = malloc(4 * sizeof(double));",
            "// run backprop",
            "double *nabla_w[] = {",
            "malloc(network.s0 * network.s1 * sizeof(double)),",
            "malloc(network.s1 * network.s2 * sizeof(double)),",
            "double *nabla_b[] = {",
            "double loss = back_propagation(network, inputs, label, nabla_w, nabla_b);",
            "// compare loss",
            "assert_scalar(\"loss\", ",
            "// compare gradients",
            "assert_array(\"nabla_w1\", 6, nabla_w1, nabla_w[0]);",
            "assert_array(\"nabla_b1\", 3, nabla_b1, nabla_b[0]);",
            "assert_array(\"nabla_w2\", 12, nabla_w2, nabla_w[1]);",
            "assert_array(\"nabla_b2\", 4, nabla_b2, nabla_b[1]);",
            "// free gradients",
            "free(nabla_w1);",
            "free(nabla_w[0]);",
            "free(nabla_b[1]);",
            "// free inputs and labels",
            "free(inputs);",
            "free(label);",
        ];
        let mut at = 0;
        for needle in order {
            let pos = text[at..]
                .find(needle)
                .unwrap_or_else(|| panic!("{needle:?} missing after byte {at}"));
            at += pos + needle.len();
        }
    }

    #[test]
    fn loss_literal_round_trips() {
        let cfg = GeneratorConfig::default();
        let oracle = Oracle::evaluate(cfg.shape, cfg.seed).unwrap();
        let f = emit(&oracle, &cfg).unwrap();
        let line = f
            .as_str()
            .lines()
            .find(|l| l.contains("assert_scalar"))
            .unwrap();
        let literal = line
            .trim()
            .strip_prefix("assert_scalar(\"loss\", ")
            .and_then(|s| s.strip_suffix(", loss);"))
            .unwrap();
        assert_eq!(literal.parse::<f64>().unwrap().to_bits(), oracle.loss().to_bits());
    }

    #[test]
    fn ledger_is_balanced() {
        let f = fixture();
        f.ledger().check().unwrap();
        assert_eq!(f.ledger().acquired().len(), 10);
        assert_eq!(f.ledger().released().len(), 10);
        assert_eq!(f.assignments(), 6 + 12 + 3 + 4 + 6 + 3 + 12 + 4 + 2 + 4);
    }

    #[test]
    fn ledger_reports_leaks_and_double_frees() {
        let mut ledger = BufferLedger::default();
        ledger.acquire("a");
        ledger.acquire("b");
        ledger.release("a");
        assert!(format!("{}", ledger.check().unwrap_err()).contains("b is never freed"));

        ledger.release("b");
        ledger.check().unwrap();

        ledger.release("b");
        assert!(format!("{}", ledger.check().unwrap_err()).contains("freed twice"));

        let mut stray = BufferLedger::default();
        stray.release("c");
        assert!(stray.check().is_err());
    }

    #[test]
    fn shape_mismatch_between_oracle_and_config_is_fatal() {
        let oracle = Oracle::evaluate(NetworkShape::new(3, 3, 3).unwrap(), 0).unwrap();
        let err = emit(&oracle, &GeneratorConfig::default()).unwrap_err();
        assert!(matches!(err, Error::InvalidShape(_)));
    }

    #[test]
    fn prelude_is_opt_in() {
        let mut cfg = GeneratorConfig::default();
        let oracle = Oracle::evaluate(cfg.shape, cfg.seed).unwrap();
        assert!(!emit(&oracle, &cfg).unwrap().as_str().contains("int assert_fails"));

        cfg.emit_assert_primitives = true;
        let text = emit(&oracle, &cfg).unwrap().into_string();
        let prelude = text.find("int assert_fails").unwrap();
        let routine = text.find("void test_back_propagation()").unwrap();
        assert!(text.starts_with("/* automatically generated by"));
        assert!(prelude < routine);
    }

    #[test]
    fn indent_lines_normalizes_whitespace() {
        let out = indent_lines(&["a;  ", "", "   ", "  b;\t"]);
        assert_eq!(out, "    a;\n\n\n      b;\n");
    }
}
