fn main() {
    let code = alda_client::run(std::env::args_os());
    std::process::exit(code.code());
}
