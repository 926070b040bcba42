// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//    http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
use std::fs;

use clap::{arg, Command};
use log::LevelFilter;
use log4rs::append::console::ConsoleAppender;
use log4rs::config::{Appender, Config, Root};
use log4rs::encode::pattern::PatternEncoder;

use evm_cfg::address::Address;
use evm_cfg::block::BasicBlockPartitioner;
use evm_cfg::builders::{BlockTable, DynamicContractCFGBuilder, DynamicTransactionCFGBuilder, StaticContractCFGBuilder};
use evm_cfg::disassembler::Disassembler;
use evm_cfg::error::{Error, Result};
use evm_cfg::render::{render, RenderMode};
use evm_cfg::rpc::JsonRpcClient;
use evm_cfg::trace::TraceIngestor;
use evm_cfg::util::FromHexString;

fn main() {
    let matches = Command::new("evm-cfg")
        .about("Reconstructs EVM control-flow graphs from a recorded transaction trace")
        .version("0.1.0")
        .arg(arg!(--verbose "Show verbose output"))
        .arg(arg!(<provider> "JSON-RPC endpoint of an archive node"))
        .arg(arg!(<tx_hash> "Transaction hash to trace"))
        .get_matches();

    let verbose = matches.is_present("verbose");
    init_logging(if verbose { LevelFilter::Info } else { LevelFilter::Warn });

    let provider = matches.get_one::<String>("provider").unwrap();
    let tx_hash = matches.get_one::<String>("tx_hash").unwrap();

    match run(provider, tx_hash) {
        Ok(result_dir) => {
            println!("wrote CFG artefacts to {result_dir}");
            std::process::exit(0);
        }
        Err(e) => {
            eprintln!("evm-cfg: {e}");
            std::process::exit(1);
        }
    }
}

fn run(provider: &str, tx_hash: &str) -> Result<String> {
    let result_dir = format!("Result/{}", tx_hash.trim_start_matches("0x"));
    fs::create_dir_all(&result_dir).map_err(|e| Error::Io { path: result_dir.clone(), source: e })?;

    let client = JsonRpcClient::new(provider);

    log::info!("fetching destination address of {tx_hash}");
    let destination_raw = client.transaction_destination(tx_hash)?.ok_or_else(|| Error::Invariant {
        reason: "transaction has no destination address (contract creation transactions are unsupported)".to_string(),
    })?;
    let destination = Address::parse(&destination_raw).ok_or_else(|| Error::MalformedResponse {
        endpoint: provider.to_string(),
        reason: format!("could not parse destination address {destination_raw:?}"),
    })?;

    log::info!("fetching execution trace of {tx_hash}");
    let raw_trace = client.trace_transaction(tx_hash)?;
    let trace = TraceIngestor::new().ingest(tx_hash, destination, raw_trace);
    log::info!("normalized trace carries {} steps", trace.steps.len());

    let contracts = trace.contract_addresses();
    log::info!("transaction touches {} contract(s)", contracts.len());

    let mut all_blocks = Vec::new();
    let mut blocks_by_contract = Vec::new();
    for address in &contracts {
        let code = match client.get_code(&address.to_string()) {
            Ok(code) => code,
            Err(e) => {
                log::warn!("could not fetch bytecode for {address}: {e}");
                continue;
            }
        };
        let bytes = code.from_hex_string().map_err(|_| Error::MalformedResponse {
            endpoint: provider.to_string(),
            reason: format!("non-hex bytecode returned for {address}"),
        })?;
        let instructions = Disassembler::new(&bytes).disassemble();
        let (blocks, _) = BasicBlockPartitioner::new(*address).partition(instructions);
        all_blocks.extend(blocks.iter().cloned());
        blocks_by_contract.push((*address, blocks));
    }

    let table = BlockTable::new(&all_blocks);

    log::info!("building transaction-level dynamic CFG");
    let tx_cfg = DynamicTransactionCFGBuilder::build(&trace, &table);
    log::info!("transaction CFG: {} nodes, {} edges", tx_cfg.node_count(), tx_cfg.edge_count());

    let trace_json = serde_json::to_string_pretty(&trace)?;
    fs::write(format!("{result_dir}/trace.json"), trace_json)
        .map_err(|e| Error::Io { path: format!("{result_dir}/trace.json"), source: e })?;

    let blocks_json = serde_json::to_string_pretty(&all_blocks)?;
    fs::write(format!("{result_dir}/blocks.json"), blocks_json)
        .map_err(|e| Error::Io { path: format!("{result_dir}/blocks.json"), source: e })?;

    let tx_dot_path = format!("{result_dir}/transaction_cfg.dot");
    fs::write(&tx_dot_path, render(&tx_cfg, RenderMode::Transaction))
        .map_err(|e| Error::Io { path: tx_dot_path, source: e })?;

    for (address, blocks) in &blocks_by_contract {
        let short = address.short_hex();

        log::info!("building dynamic CFG for contract {short}");
        let contract_cfg = DynamicContractCFGBuilder::build(*address, &trace, &table);
        let contract_dot_path = format!("{result_dir}/contract_{short}_cfg.dot");
        fs::write(&contract_dot_path, render(&contract_cfg, RenderMode::Contract))
            .map_err(|e| Error::Io { path: contract_dot_path, source: e })?;

        log::info!("building static complete CFG for contract {short}");
        let static_cfg = StaticContractCFGBuilder::build(*address, blocks);
        let static_dot_path = format!("{result_dir}/contract_{short}_static_cfg.dot");
        fs::write(&static_dot_path, render(&static_cfg, RenderMode::StaticContract))
            .map_err(|e| Error::Io { path: static_dot_path, source: e })?;
    }

    Ok(result_dir)
}

/// Initialise logging using a suitable pattern.
fn init_logging(level: LevelFilter) {
    let encoder = PatternEncoder::new("[{l}] {m}{n}");
    let stdout = ConsoleAppender::builder().encoder(Box::new(encoder)).build();
    let config = Config::builder()
        .appender(Appender::builder().build("stdout", Box::new(stdout)))
        .build(Root::builder().appender("stdout").build(level))
        .unwrap();
    let _handle = log4rs::init_config(config).unwrap();
}
