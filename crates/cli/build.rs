use std::{env, fs, path::PathBuf};

fn main() {
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-env-changed=OUT_DIR");

    let out_dir = PathBuf::from(env::var("OUT_DIR").unwrap());
    let completions_dir = out_dir.join("completions");

    fs::create_dir_all(&completions_dir).unwrap();

    let mut cmd = clap::Command::new("blog2pod")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Turn a blog article into a narrated MP3 podcast")
        .arg(clap::arg!(<URL> "Article URL (http:// or https://)"))
        .arg(
            clap::arg!(--"completed-dir" <DIR> "Directory for finished podcasts")
                .value_name("DIR")
                .value_parser(clap::value_parser!(std::path::PathBuf)),
        )
        .arg(clap::arg!(--"no-render" "Skip the headless browser and fetch over plain HTTP"))
        .arg(clap::arg!(--"no-clean" "Skip the language-model cleaning pass"))
        .arg(clap::arg!(--"no-pagination" "Only narrate the first page of paginated posts"))
        .arg(clap::arg!(--"chunk-size" <N> "Characters per speech request").value_name("N"))
        .arg(clap::arg!(--"print-text" "Print the narration text instead of producing audio"))
        .arg(clap::arg!(-v --verbose "Enable debug logging"));

    clap_complete::generate_to(clap_complete::shells::Bash, &mut cmd, "blog2pod", &completions_dir).unwrap();
    clap_complete::generate_to(clap_complete::shells::Zsh, &mut cmd, "blog2pod", &completions_dir).unwrap();
    clap_complete::generate_to(clap_complete::shells::Fish, &mut cmd, "blog2pod", &completions_dir).unwrap();
    clap_complete::generate_to(clap_complete::shells::PowerShell, &mut cmd, "blog2pod", &completions_dir).unwrap();

    println!(
        "cargo:warning=Shell completions generated in: {}",
        completions_dir.display()
    );
}
