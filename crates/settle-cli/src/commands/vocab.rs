use super::{json_pretty, EXIT_SUCCESS};
use settle_schema::{MappingCompat, VocabKind};

pub fn run(
    kind: Option<&str>,
    input: Option<&str>,
    legacy: bool,
    json: bool,
) -> Result<u8, String> {
    let compat = if legacy {
        MappingCompat::Legacy
    } else {
        MappingCompat::Current
    };

    let Some(kind) = kind else {
        return list_all(json);
    };
    let kind = VocabKind::from_name(kind).map_err(|e| e.to_string())?;

    match input {
        Some(input) => {
            let wire = kind.resolve(input, compat);
            if json {
                let payload = serde_json::json!({
                    "vocabulary": kind.name(),
                    "input": input,
                    "value": wire,
                    "matched": !wire.is_empty(),
                });
                println!("{}", json_pretty(&payload)?);
            } else if wire.is_empty() {
                println!("(unset)");
            } else {
                println!("{wire}");
            }
        }
        None => {
            if json {
                println!("{}", json_pretty(&kind.accepted())?);
            } else {
                for value in kind.accepted() {
                    println!("{value}");
                }
            }
        }
    }
    Ok(EXIT_SUCCESS)
}

fn list_all(json: bool) -> Result<u8, String> {
    if json {
        let payload: serde_json::Map<String, serde_json::Value> = VocabKind::ALL
            .into_iter()
            .map(|k| (k.name().to_owned(), serde_json::json!(k.accepted())))
            .collect();
        println!("{}", json_pretty(&payload)?);
    } else {
        for kind in VocabKind::ALL {
            println!("{kind}: {}", kind.accepted().join(" "));
        }
    }
    Ok(EXIT_SUCCESS)
}
