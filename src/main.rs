fn main() {
    movella_bids::cli::run();
}
