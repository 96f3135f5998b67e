fn main() {
    jsonheal::cli::main();
}
