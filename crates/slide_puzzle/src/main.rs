fn main() {
    slide_puzzle::run();
}
