fn main() {
    media_catalog_lib::run()
}
