fn main() {
    astgen::cli::run();
}
