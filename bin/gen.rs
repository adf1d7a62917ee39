use clap::{Arg, ArgAction, Command};
use grant_csv_import::REQUIRED_COLUMNS;
use std::io::{self, Write};

const CITIES: [(&str, &str); 4] = [
    ("Springfield", "IL"),
    ("Portland", "OR"),
    ("Austin", "TX"),
    ("Albany", "NY"),
];

fn main() -> anyhow::Result<()> {
    let matches = Command::new("gen")
        .about("Write a sample grant CSV to stdout")
        .arg(
            Arg::new("rows")
                .long("rows")
                .value_parser(clap::value_parser!(u64))
                .required(true),
        )
        .arg(
            Arg::new("bom")
                .long("bom")
                .help("Start with a UTF-8 byte-order mark")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("malformed")
                .long("malformed")
                .help("Every Nth row gets a missing column (0 = never)")
                .value_parser(clap::value_parser!(u64))
                .default_value("0"),
        )
        .get_matches();

    let rows: u64 = matches.get_one("rows").copied().unwrap_or_default();
    let malformed: u64 = matches.get_one("malformed").copied().unwrap_or_default();

    let mut out = io::BufWriter::new(io::stdout().lock());

    if matches.get_flag("bom") {
        out.write_all(b"\xef\xbb\xbf")?;
    }
    let header: Vec<String> = REQUIRED_COLUMNS.iter().map(|c| quote(c)).collect();
    writeln!(out, "{}", header.join(","))?;

    for i in 1..=rows {
        let (city, state) = CITIES[(i as usize) % CITIES.len()];
        let month = (i % 12) + 1;
        let day = (i % 28) + 1;
        write!(
            out,
            "{},T{:07},{},{},{}/{}/2024,{}/{}/2029,{},director{}@example.org",
            quote(&format!("Health Center {i}, Inc.")),
            i,
            city,
            state,
            month,
            day,
            month,
            day,
            quote(&format!("Pat Q. Director{i}")),
            i
        )?;
        if malformed != 0 && i % malformed == 0 {
            // one cell short
            writeln!(out)?;
            continue;
        }
        writeln!(out, ",555-{:03}-{:04} Ext: {}", i % 1000, i % 10_000, i % 100)?;
        if i % 10_000 == 0 {
            out.flush()?;
        }
    }

    out.flush()?;
    Ok(())
}

fn quote(field: &str) -> String {
    if field.contains([',', '"', '\n']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}
