use std::{
    fs,
    io::{self, Read, Write},
    path::PathBuf,
    process,
    time::Duration,
};
use structopt::StructOpt;
use volley::{output, Batch, Client, ExchangeResult};

/// Fire a batch of HTTP requests concurrently and print every response.
///
/// The batch is a JSON array of request objects, each with a `method`, a
/// `url`, and optional `headers` and `body`. One line is printed per request
/// as soon as it completes: the response body, or `error[<kind>]: <message>`.
#[derive(Debug, StructOpt)]
#[structopt(name = "volley")]
struct Opt {
    /// Batch payload as a JSON string.
    #[structopt(long, env = "PAYLOAD", hide_env_values = true, conflicts_with = "payload-file")]
    payload: Option<String>,

    /// Read the batch payload from a file, or from stdin if `-`.
    #[structopt(long, parse(from_os_str))]
    payload_file: Option<PathBuf>,

    /// Time allowed for establishing each connection.
    #[structopt(long, default_value = "3s", parse(try_from_str = humantime::parse_duration))]
    connect_timeout: Duration,

    /// Additional time allowed for the TLS handshake of https requests.
    #[structopt(long = "tls-timeout", default_value = "3s", parse(try_from_str = humantime::parse_duration))]
    tls_handshake_timeout: Duration,

    /// Time allowed for each whole exchange.
    #[structopt(long, default_value = "20s", parse(try_from_str = humantime::parse_duration))]
    timeout: Duration,

    /// Limit the number of simultaneous connections. 0 means no limit.
    #[structopt(long, default_value = "0")]
    max_connections: usize,

    /// Print results in batch order once every request has completed.
    #[structopt(long)]
    ordered: bool,

    /// Log what is going on to stderr.
    #[structopt(short, long)]
    verbose: bool,
}

impl Opt {
    fn read_payload(&self) -> io::Result<String> {
        match (&self.payload, &self.payload_file) {
            (Some(payload), _) => Ok(payload.clone()),
            (None, Some(path)) if path.as_os_str() == "-" => {
                let mut payload = String::new();
                io::stdin().read_to_string(&mut payload)?;
                Ok(payload)
            }
            (None, Some(path)) => fs::read_to_string(path),
            (None, None) => Ok(String::new()),
        }
    }
}

fn main() {
    let opt = Opt::from_args();

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(if opt.verbose { "debug" } else { "warn" }),
    )
    .init();

    process::exit(run(opt));
}

fn run(opt: Opt) -> i32 {
    let payload = match opt.read_payload() {
        Ok(payload) => payload,
        Err(e) => {
            eprintln!("volley: failed to read payload: {}", e);
            return 2;
        }
    };

    let batch = match Batch::parse(&payload) {
        Ok(batch) => batch,
        Err(e) => {
            eprintln!("volley: invalid payload: {}", e);
            return 2;
        }
    };

    log::debug!("{}", volley::version());

    let client = match Client::builder()
        .connect_timeout(opt.connect_timeout)
        .tls_handshake_timeout(opt.tls_handshake_timeout)
        .timeout(opt.timeout)
        .max_connections(opt.max_connections)
        .build()
    {
        Ok(client) => client,
        Err(e) => {
            eprintln!("volley: failed to initialize client: {}", e);
            return 1;
        }
    };

    let stdout = io::stdout();
    let mut out = stdout.lock();

    let emit = |result: ExchangeResult| {
        if let Err(e) = output::write_result(&mut out, &result).and_then(|_| out.flush()) {
            log::warn!("failed to write result #{}: {}", result.index(), e);
        }
    };

    let report = if opt.ordered {
        client.dispatch_ordered(batch, emit)
    } else {
        client.dispatch(batch, emit)
    };

    log::info!(
        "{} of {} exchanges succeeded",
        report.succeeded(),
        report.dispatched()
    );

    0
}
