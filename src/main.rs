use structopt::StructOpt;

fn main() -> permck_util::Fallible<()> {
    permck::Options::from_args().main()
}
