fn main() {
    batch_forge::cli::run();
}
