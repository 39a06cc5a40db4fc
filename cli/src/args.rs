use cache_core::config::Associativity;

peg::parser!(grammar arg() for str {
    rule ways() -> u64
        = n:$(quiet!{['0'..='9']+}) {? n.parse().or(Err("number of ways")) }
        / expected!("number of ways")
    pub(crate) rule associativity() -> Associativity
        = "direct" { Associativity::Direct }
        / "assoc:" n:ways() { Associativity::Ways(n) }
        / "assoc" { Associativity::Full }
        / expected!("`direct`, `assoc` or `assoc:<n>`")
});

pub(crate) fn parse_associativity(s: &str) -> Result<Associativity, String> {
    arg::associativity(s).map_err(|e| format!("invalid associativity `{s}`: {e}"))
}
