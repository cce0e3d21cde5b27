use std::env;
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

fn main() {
    let out_dir = env::var("OUT_DIR").unwrap();
    let dest_path = Path::new(&out_dir).join("keysym_table.rs");
    let source = fs::read_to_string("data/keysyms.txt").unwrap();
    let mut f = File::create(&dest_path).unwrap();

    writeln!(f, "/// Every keysym name X knows, in keysymdef.h order").unwrap();
    writeln!(f, "const KEYSYM_TABLE: &[(&str, u32)] = &[").unwrap();
    for (lineno, line) in source.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let mut fields = line.split_whitespace();
        let (Some(name), Some(value), None) = (fields.next(), fields.next(), fields.next()) else {
            panic!("data/keysyms.txt:{}: expected '<name> <value>'", lineno + 1);
        };
        let value = value
            .strip_prefix("0x")
            .and_then(|hex| u32::from_str_radix(hex, 16).ok())
            .unwrap_or_else(|| panic!("data/keysyms.txt:{}: bad value", lineno + 1));
        writeln!(f, "    ({:?}, 0x{:x}),", name, value).unwrap();
    }
    writeln!(f, "];").unwrap();

    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-changed=data/keysyms.txt");
}
