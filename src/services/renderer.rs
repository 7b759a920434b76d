//! Template renderer.
//!
//! Deliberately minimal: the contract is exactly "replace `{{key}}` tokens
//! with the value's textual form". There is no nested expansion, no
//! conditionals, no escaping, and unknown tokens are left verbatim in the
//! output; that last part is a feature, not an error, so partially-filled
//! templates remain inspectable downstream.

/// Replace every literal `{{key}}` token with its value from `variables`.
///
/// `variables` is expected to be a JSON object; any other shape renders the
/// template unchanged. String values substitute verbatim; other JSON values
/// substitute as their JSON rendering (`42`, `true`, `["a"]`).
///
/// The scan moves left to right and substituted values are never re-scanned
/// for tokens, so substitution is insensitive to key order and there is no
/// nested expansion. Pure and deterministic: repeated calls with the same
/// inputs produce byte-identical output.
pub fn render(template: &str, variables: &serde_json::Value) -> String {
    let Some(map) = variables.as_object() else {
        return template.to_string();
    };

    let mut output = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find("{{") {
        let Some(end) = rest[start + 2..].find("}}") else {
            // No closing braces left anywhere
            break;
        };
        let key = &rest[start + 2..start + 2 + end];

        output.push_str(&rest[..start]);
        match map.get(key) {
            Some(serde_json::Value::String(s)) => {
                output.push_str(s);
                rest = &rest[start + 2 + end + 2..];
            }
            Some(other) => {
                output.push_str(&other.to_string());
                rest = &rest[start + 2 + end + 2..];
            }
            None => {
                // Unknown token: emit one byte and retry from the very next
                // brace, so an overlapping open like "{{{a}}" still matches
                // the inner token
                output.push('{');
                rest = &rest[start + 1..];
            }
        }
    }

    output.push_str(rest);
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn substitutes_string_values() {
        let out = render("Hello {{name}}", &json!({"name": "Ada"}));
        assert_eq!(out, "Hello Ada");
    }

    #[test]
    fn substitutes_every_occurrence() {
        let out = render("{{n}} and {{n}} again", &json!({"n": "x"}));
        assert_eq!(out, "x and x again");
    }

    #[test]
    fn unknown_tokens_stay_verbatim() {
        let out = render("Hi {{name}}, your code is {{code}}", &json!({"name": "Ada"}));
        assert_eq!(out, "Hi Ada, your code is {{code}}");
    }

    #[test]
    fn empty_variables_is_identity() {
        let template = "Hello {{name}}, welcome!";
        assert_eq!(render(template, &json!({})), template);
    }

    #[test]
    fn non_object_variables_is_identity() {
        let template = "Hello {{name}}";
        assert_eq!(render(template, &json!("not an object")), template);
        assert_eq!(render(template, &json!(null)), template);
    }

    #[test]
    fn non_string_values_use_json_rendering() {
        let out = render(
            "count={{count}} flag={{flag}}",
            &json!({"count": 3, "flag": true}),
        );
        assert_eq!(out, "count=3 flag=true");
    }

    #[test]
    fn overlapping_braces_match_the_inner_token() {
        // "{{{a}}" contains a literal "{{a}}" starting at the second brace
        assert_eq!(render("{{{a}}", &json!({"a": "x"})), "{x");
        assert_eq!(render("{{{a}}}", &json!({"a": "x"})), "{x}");
    }

    #[test]
    fn unknown_token_after_unknown_open_stays_verbatim() {
        assert_eq!(render("{{{a}}", &json!({})), "{{{a}}");
    }

    #[test]
    fn unclosed_token_passes_through() {
        let out = render("Hello {{name", &json!({"name": "Ada"}));
        assert_eq!(out, "Hello {{name");
    }

    #[test]
    fn render_is_deterministic_and_fixed_point() {
        let variables = json!({"a": "1", "b": "2"});
        let first = render("{{a}}-{{b}}-{{c}}", &variables);
        let second = render("{{a}}-{{b}}-{{c}}", &variables);
        assert_eq!(first, second);

        // One pass already reached the fixed point for resolved tokens
        assert_eq!(render(&first, &variables), first);
    }

    #[test]
    fn values_are_not_rescanned_for_tokens() {
        // No nested expansion: a value containing token syntax passes through
        let out = render("{{a}}", &json!({"a": "{{b}}", "b": "nope"}));
        assert_eq!(out, "{{b}}");
    }
}
