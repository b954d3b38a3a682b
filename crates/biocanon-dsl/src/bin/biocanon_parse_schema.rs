use std::{env, path::Path};

use biocanon_dsl::load_schema_file;

fn main() {
    let mut args = env::args().skip(1);
    let Some(path) = args.next() else {
        eprintln!("usage: biocanon_parse_schema <schema.yaml|schema.json>");
        std::process::exit(2);
    };
    if args.next().is_some() {
        eprintln!("usage: biocanon_parse_schema <schema.yaml|schema.json>");
        std::process::exit(2);
    }

    match load_schema_file(Path::new(&path)) {
        Ok(schema) => {
            println!(
                "ok(schema): types={} associations={} digest={}",
                schema.types.len(),
                schema.association_count(),
                schema.digest()
            );
        }
        Err(err) => {
            eprintln!("{err}");
            std::process::exit(1);
        }
    }
}
