//! Default run instructions per language.
//!
//! The first file of a request is the main file. Additional files take part
//! in the build only when they carry the language's source extension.

use crate::core::types::RunInstructions;
use crate::exec::command_line::quote;
use crate::judge::languages::Language;
use std::path::Path;

const NATIVE_BINARY: &str = "./a.out";

/// Build the preset instructions for `language`.
pub fn run_instructions(language: Language, main_file: &str, other_files: &[&str]) -> RunInstructions {
    let main = quote(main_file);
    let sources = matching_sources(language, other_files);

    match language {
        Language::Assembly => RunInstructions {
            build_commands: vec![format!("nasm -f elf64 -o a.o {}", main), "ld -o a.out a.o".to_string()],
            run_command: NATIVE_BINARY.to_string(),
        },
        Language::Ats => native(words(["patscc -o a.out", main.as_str()], &sources)),
        Language::Bash => interpret("bash", &main),
        Language::C => native(words(["clang -o a.out -lm", main.as_str()], &sources)),
        Language::Clisp => interpret("sbcl --noinform --non-interactive --load", &main),
        Language::Clojure => interpret("clj -M", &main),
        Language::Cobol => native(words(["cobc -x -o a.out", main.as_str()], &sources)),
        Language::CoffeeScript => interpret("coffee", &main),
        Language::Cpp => native(words(["clang++ -std=c++11 -o a.out", main.as_str()], &sources)),
        Language::Crystal => interpret("crystal run", &main),
        Language::Csharp => compiled(words(["mcs -out:a.exe", main.as_str()], &sources), "mono a.exe"),
        Language::D => native(words(["dmd -ofa.out", main.as_str()], &sources)),
        Language::Dart => interpret("dart", &main),
        Language::Elixir => RunInstructions::run_only(words(["elixirc", main.as_str()], &sources)),
        Language::Elm => compiled(format!("elm make --output a.js {}", main), "elm-runner a.js"),
        Language::Erlang => RunInstructions {
            build_commands: sources.iter().map(|file| format!("erlc {}", file)).collect(),
            run_command: format!("escript {}", main),
        },
        Language::Fsharp => compiled(dependencies_first("fsharpc --out:a.exe", sources, &main), "mono a.exe"),
        Language::Go => native(format!("go build -o a.out {}", main)),
        Language::Groovy => interpret("groovy", &main),
        Language::Guile => interpret("guile --no-debug --fresh-auto-compile --no-auto-compile -s", &main),
        Language::Hare => native(format!("hare build -o a.out {}", main)),
        Language::Haskell => interpret("runghc", &main),
        Language::Idris => native(format!("idris2 -o a.out --output-dir . {}", main)),
        Language::Java => compiled(
            format!("javac {}", main),
            &format!("java {}", quote(&class_name(main_file))),
        ),
        Language::JavaScript => interpret("node", &main),
        Language::Julia => interpret("julia", &main),
        Language::Kotlin => compiled(
            format!("kotlinc {}", main),
            &format!("kotlin {}", quote(&format!("{}Kt", class_name(main_file)))),
        ),
        Language::Lua => interpret("lua", &main),
        Language::Mercury => native(words(["mmc -o a.out", main.as_str()], &sources)),
        Language::Nim => interpret("nim --hints:off --verbosity:0 compile --run", &main),
        Language::Nix => interpret("nix-instantiate --eval", &main),
        Language::Ocaml => native(dependencies_first("ocamlc -o a.out", sources, &main)),
        Language::Pascal => native(format!("fpc -oa.out {}", main)),
        Language::Perl => interpret("perl", &main),
        Language::Php => interpret("php", &main),
        Language::Python => interpret("python", &main),
        Language::Raku => interpret("raku", &main),
        Language::Ruby => interpret("ruby", &main),
        Language::Rust => native(format!("rustc -o a.out {}", main)),
        Language::Sac => native(words(["sac2c -t seq -o a.out", main.as_str()], &sources)),
        Language::Scala => compiled(words(["scalac", main.as_str()], &sources), "scala Main"),
        Language::Swift => native(words(["swiftc -o a.out", main.as_str()], &sources)),
        Language::TypeScript => compiled(words(["tsc -outFile a.js", main.as_str()], &sources), "node a.js"),
        Language::Zig => interpret("zig run", &main),
    }
}

fn interpret(program: &str, main: &str) -> RunInstructions {
    RunInstructions::run_only(format!("{} {}", program, main))
}

fn compiled(build: String, run: &str) -> RunInstructions {
    RunInstructions {
        build_commands: vec![build],
        run_command: run.to_string(),
    }
}

fn native(build: String) -> RunInstructions {
    compiled(build, NATIVE_BINARY)
}

/// Quoted names of the other files with the language's source extension
fn matching_sources(language: Language, other_files: &[&str]) -> Vec<String> {
    let Some(extension) = language.source_extension() else {
        return Vec::new();
    };

    other_files
        .iter()
        .filter(|name| Path::new(name).extension().and_then(|e| e.to_str()) == Some(extension))
        .map(|name| quote(name))
        .collect()
}

fn words<'a>(head: impl IntoIterator<Item = &'a str>, tail: &'a [String]) -> String {
    head.into_iter()
        .chain(tail.iter().map(String::as_str))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Compilers that need dependencies before their users get the other files
/// in reverse request order, then the main file.
fn dependencies_first(compiler: &str, mut sources: Vec<String>, main: &str) -> String {
    sources.reverse();
    sources.push(main.to_string());
    words([compiler], &sources)
}

/// JVM class name derived from the main file: its stem, first letter upper-cased
fn class_name(main_file: &str) -> String {
    let stem = Path::new(main_file)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("Main");

    let mut chars = stem.chars();
    match chars.next() {
        Some(first) if stem.is_ascii() && stem.len() > 1 => {
            format!("{}{}", first.to_ascii_uppercase(), chars.as_str())
        }
        _ => stem.to_string(),
    }
}
