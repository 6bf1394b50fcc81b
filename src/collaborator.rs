//! C API of the network implementation under test.
//!
//! The generated routine only calls into these names; it never defines them
//! (unless the assertion prelude is requested). Keep them in sync with the C
//! sources that include the generated file.
//!
//! ```c
//! Network make_network(int s0, int s1, int s2);
//! double back_propagation(Network network, double *inputs, double *label,
//!                         double **nabla_w, double **nabla_b);
//! void assert_scalar(char *name, double expected, double actual);
//! void assert_array(char *name, int size, double *expected, double *actual);
//! ```

use crate::Param;

pub const NETWORK_TYPE: &str = "Network";
pub const NETWORK_VAR: &str = "network";
pub const MAKE_NETWORK: &str = "make_network";
pub const BACK_PROPAGATION: &str = "back_propagation";
pub const ASSERT_SCALAR: &str = "assert_scalar";
pub const ASSERT_ARRAY: &str = "assert_array";

/// Output buffer arrays handed to `back_propagation`, indexed by layer.
pub const NABLA_W: &str = "nabla_w";
pub const NABLA_B: &str = "nabla_b";

/// Absolute tolerance of `assert_scalar`; the loss accumulates over every output.
pub const SCALAR_TOLERANCE: f64 = 1e-3;

/// Absolute per-element tolerance of `assert_array`.
pub const ARRAY_TOLERANCE: f64 = 1e-6;

/// `network.w1` and friends.
pub fn network_field(param: Param) -> String {
    format!("{NETWORK_VAR}.{}", param.name())
}

/// Buffer holding the expected gradient, e.g. `nabla_w1`.
pub fn expected_gradient_buffer(param: Param) -> String {
    format!("nabla_{}", param.name())
}

/// Element of `nabla_w` / `nabla_b` the routine writes the gradient into.
pub fn output_gradient_slot(param: Param) -> String {
    let array = if param.is_weight() { NABLA_W } else { NABLA_B };
    format!("{array}[{}]", param.layer())
}

/// Shape field expression for `malloc` sizes, e.g. `network.s0 * network.s1`.
pub fn output_gradient_size(param: Param) -> String {
    let fields: &[&str] = match param {
        Param::W1 => &["s0", "s1"],
        Param::B1 => &["s1"],
        Param::W2 => &["s1", "s2"],
        Param::B2 => &["s2"],
    };
    fields
        .iter()
        .map(|f| format!("{NETWORK_VAR}.{f}"))
        .collect::<Vec<_>>()
        .join(" * ")
}

/// C definitions of the assertion primitives.
///
/// Each failed comparison bumps the global `assert_fails` counter. Both functions
/// print the mismatch and keep going, so one run reports every bad tensor.
pub fn assert_primitives() -> String {
    format!(
        r#"#include <math.h>
#include <stdio.h>

int assert_fails = 0;

void {ASSERT_ARRAY}(char *name, int size, double *expected, double *actual)
{{
    for (int i = 0; i < size; i++)
    {{
        if (fabs(expected[i] - actual[i]) > {ARRAY_TOLERANCE:e})
        {{
            assert_fails += 1;
            printf("array comparison \"%s\" failed at %d\n", name, i);
            printf("expected: %.17g\n", expected[i]);
            printf("  actual: %.17g\n\n", actual[i]);
            return;
        }}
    }}
}}

void {ASSERT_SCALAR}(char *name, double expected, double actual)
{{
    if (fabs(expected - actual) > {SCALAR_TOLERANCE:e})
    {{
        assert_fails += 1;
        printf("scalar comparison \"%s\" failed\n", name);
        printf("expected: %.17g\n", expected);
        printf("  actual: %.17g\n\n", actual);
    }}
}}
"#
    )
}
