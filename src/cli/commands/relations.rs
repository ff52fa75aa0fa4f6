//! relations command - Print the relation registry

use crate::core::relations::{Cardinality, Relation, RelationDefinition};
use anyhow::Result;

/// Print every relation definition as a table or JSON.
pub fn relations(json: bool) -> Result<()> {
    let defs: Vec<&RelationDefinition> = Relation::ALL.iter().map(|r| r.definition()).collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&defs)?);
        return Ok(());
    }

    println!(
        "{:<30} {:<9} {:<10} {:<30} FACET",
        "RELATION", "VALUES", "EXCLUSIVE", "INVERSE"
    );
    for def in defs {
        let values = match def.cardinality {
            Cardinality::Single => "single",
            Cardinality::Multiple => "multiple",
        };
        println!(
            "{:<30} {:<9} {:<10} {:<30} {}",
            def.name,
            values,
            if def.exclusive { "yes" } else { "no" },
            def.inverse.map(Relation::name).unwrap_or("-"),
            def.facet.unwrap_or("-"),
        );
    }
    Ok(())
}
