/// Resolves the output file name for a dv/v figure.
///
/// A pattern starting with `?` has the `?` replaced by
/// `<components>-f<filter>-m<window>-M<dtt>` when a single window was
/// requested, or `<components>-f<filter>-M<dtt>` otherwise. Every name is
/// prefixed with `"dvv "`.
pub fn resolve_outfile(
    pattern: &str,
    components: &[String],
    filter_id: u32,
    mov_stacks: &[u32],
    dtt_name: &str,
) -> String {
    let mut name = pattern.to_string();

    if pattern.starts_with('?') {
        let comps = components.join(",");
        let tag = match mov_stacks {
            [mov_stack] => format!("{}-f{}-m{}-M{}", comps, filter_id, mov_stack, dtt_name),
            _ => format!("{}-f{}-M{}", comps, filter_id, dtt_name),
        };
        name = pattern.replace('?', &tag);
    }

    format!("dvv {}", name)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn comps(s: &[&str]) -> Vec<String> {
        s.iter().map(|c| c.to_string()).collect()
    }

    #[test]
    fn test_single_variant_embeds_window() {
        let name = resolve_outfile("?.png", &comps(&["ZZ"]), 1, &[5], "M");
        assert_eq!(name, "dvv ZZ-f1-m5-MM.png");
    }

    #[test]
    fn test_multiple_variants_omit_window() {
        let name = resolve_outfile("?.png", &comps(&["ZZ", "ZN"]), 2, &[1, 5, 10], "M0");
        assert_eq!(name, "dvv ZZ,ZN-f2-MM0.png");
    }

    #[test]
    fn test_plain_name_is_only_prefixed() {
        let name = resolve_outfile("figure.json", &comps(&["ZZ"]), 1, &[1], "M");
        assert_eq!(name, "dvv figure.json");
    }
}
