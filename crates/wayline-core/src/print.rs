//! Textual rendering of route definitions
//!
//! The core produces (never parses) the textual route syntax. The
//! compact form puts a whole route on one line; the pretty form breaks
//! predicates and filters onto continuation lines with two-space
//! indentation.

use crate::definition::{Backend, RouteDefinition};
use std::fmt::Write;

/// Render one route definition.
pub fn write_route(out: &mut String, def: &RouteDefinition, pretty: bool) {
    let sep_pred = if pretty { "\n  && " } else { " && " };
    let sep_filter = if pretty { "\n  -> " } else { " -> " };

    let _ = write!(out, "{}: ", def.id);

    if def.predicates.is_empty() {
        out.push('*');
    } else {
        for (i, p) in def.predicates.iter().enumerate() {
            if i > 0 {
                out.push_str(sep_pred);
            }
            let _ = write!(out, "{}", p);
        }
    }

    for f in &def.filters {
        out.push_str(sep_filter);
        let _ = write!(out, "{}", f);
    }

    out.push_str(sep_filter);
    write_backend(out, &def.backend);
    out.push(';');
}

fn write_backend(out: &mut String, backend: &Backend) {
    match backend {
        Backend::Network { scheme, host } => {
            let _ = write!(out, "\"{}://{}\"", scheme, host);
        }
        Backend::Shunt => out.push_str("<shunt>"),
        Backend::Loopback => out.push_str("<loopback>"),
        Backend::Dynamic => out.push_str("<dynamic>"),
        Backend::LoadBalanced { endpoints } => {
            out.push('<');
            for (i, ep) in endpoints.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                let _ = write!(out, "\"{}://{}\"", ep.scheme, ep.host);
            }
            out.push('>');
        }
    }
}

/// Render a list of route definitions, one per line in compact form,
/// blank-line separated in pretty form.
pub fn routes_to_string(defs: &[RouteDefinition], pretty: bool) -> String {
    let mut out = String::new();
    for (i, def) in defs.iter().enumerate() {
        if i > 0 {
            out.push('\n');
            if pretty {
                out.push('\n');
            }
        }
        write_route(&mut out, def, pretty);
    }
    out.push('\n');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> RouteDefinition {
        RouteDefinition::new("catalog", Backend::network("http", "catalog.svc:8080"))
            .with_predicate("Path", ["/catalog/:sku"])
            .with_predicate("Method", ["GET"])
            .with_filter("setRequestHeader", ["X-Origin", "edge"])
    }

    #[test]
    fn test_compact_form() {
        let mut out = String::new();
        write_route(&mut out, &sample(), false);
        assert_eq!(
            out,
            "catalog: Path(\"/catalog/:sku\") && Method(\"GET\") \
             -> setRequestHeader(\"X-Origin\", \"edge\") \
             -> \"http://catalog.svc:8080\";"
        );
    }

    #[test]
    fn test_pretty_form_indents_two_spaces() {
        let mut out = String::new();
        write_route(&mut out, &sample(), true);
        assert_eq!(
            out,
            "catalog: Path(\"/catalog/:sku\")\n  \
             && Method(\"GET\")\n  \
             -> setRequestHeader(\"X-Origin\", \"edge\")\n  \
             -> \"http://catalog.svc:8080\";"
        );
    }

    #[test]
    fn test_no_predicates_prints_star() {
        let def = RouteDefinition::new("all", Backend::Shunt);
        let mut out = String::new();
        write_route(&mut out, &def, false);
        assert_eq!(out, "all: * -> <shunt>;");
    }

    #[test]
    fn test_load_balanced_backend() {
        let def = RouteDefinition::new(
            "lb",
            Backend::load_balanced(vec![
                ("http".to_string(), "a:80".to_string()),
                ("http".to_string(), "b:80".to_string()),
            ]),
        );
        let mut out = String::new();
        write_route(&mut out, &def, false);
        assert_eq!(out, "lb: * -> <\"http://a:80\", \"http://b:80\">;");
    }

    #[test]
    fn test_routes_to_string_separators() {
        let defs = vec![
            RouteDefinition::new("a", Backend::Shunt),
            RouteDefinition::new("b", Backend::Shunt),
        ];

        assert_eq!(
            routes_to_string(&defs, false),
            "a: * -> <shunt>;\nb: * -> <shunt>;\n"
        );
        assert_eq!(
            routes_to_string(&defs, true),
            "a: *\n  -> <shunt>;\n\nb: *\n  -> <shunt>;\n"
        );
    }
}
