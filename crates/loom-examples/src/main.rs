//! Run workflow examples from the workflows module (one example per file).

mod workflows;

use workflows::{s1_linear_text_pipeline, s2_regex_extract, s3_condition_end_branch, s4_count_loop, s5_parallel_array, s6_cancel_during_stream};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    println!("=== S1: linear text pipeline ===");
    let s1 = s1_linear_text_pipeline::run_linear_text_pipeline("world").await?;
    println!("  output: {:?}\n", s1.output);

    println!("=== S2: regex extract ===");
    let s2 = s2_regex_extract::run_regex_extract("订单号：12345").await?;
    println!("  output: {:?}\n", s2.output);

    println!("=== S3: condition end-branch ===");
    let s3 = s3_condition_end_branch::run_condition_end_branch("请停").await?;
    println!("  status: {:?}\n", s3.status);

    println!("=== S4: count loop ===");
    let (s4, _events) = s4_count_loop::run_count_loop().await?;
    println!("  status: {:?}, output: {:?}\n", s4.status, s4.output);

    println!("=== S5: parallel array ===");
    let s5 = s5_parallel_array::run_parallel_array().await?;
    println!("  output: {:?}\n", s5.output);

    println!("=== S6: cancel during stream ===");
    let (s6, _events) = s6_cancel_during_stream::run_cancel_during_stream().await?;
    println!("  status: {:?}\n", s6.status);

    Ok(())
}
