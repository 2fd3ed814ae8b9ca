use std::fs;

fn main() {
    // Validate default config at compile time
    let config_path = "src/default_config.toml";
    println!("cargo:rerun-if-changed={}", config_path);

    let content = fs::read_to_string(config_path).expect("Failed to read default_config.toml");

    let table = match content.parse::<toml::Table>() {
        Ok(table) => table,
        Err(e) => panic!("Invalid default_config.toml: {}", e),
    };

    let bullets = table
        .get("render")
        .and_then(|render| render.get("bullets"))
        .and_then(|bullets| bullets.as_array());
    match bullets {
        Some(bullets) if !bullets.is_empty() => {}
        _ => panic!("default_config.toml: render.bullets must be a non-empty array"),
    }
}
